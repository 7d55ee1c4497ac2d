//! Newline-delimited JSON messages exchanged with a model worker.

use super::ModelSpec;
use crate::data::Batch;
use crate::export::CodeMatrix;
use crate::training::LossReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkerRequest {
    Init {
        spec: ModelSpec,
    },
    /// One generator step over `real` (one batch per critic update).
    Step {
        iteration: u64,
        real: Vec<Batch>,
    },
    Evaluate {
        batch: Batch,
    },
    Snapshot {
        step: u64,
        path: PathBuf,
    },
    Restore {
        path: PathBuf,
    },
    Encode {
        batch: Batch,
    },
    /// Render generator outputs for every row of `codes` with the same `noise` vector.
    Render {
        noise: Vec<f32>,
        codes: CodeMatrix,
        rows: usize,
        path: PathBuf,
    },
    Reconstruct {
        batch: Batch,
        path: PathBuf,
    },
    Shutdown,
}

impl WorkerRequest {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Step { .. } => "step",
            Self::Evaluate { .. } => "evaluate",
            Self::Snapshot { .. } => "snapshot",
            Self::Restore { .. } => "restore",
            Self::Encode { .. } => "encode",
            Self::Render { .. } => "render",
            Self::Reconstruct { .. } => "reconstruct",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResponse {
    Ready,
    Losses(LossReport),
    Saved,
    Restored { step: u64 },
    Codes(CodeMatrix),
    Written,
    Error { message: String },
}

impl WorkerResponse {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Losses(_) => "losses",
            Self::Saved => "saved",
            Self::Restored { .. } => "restored",
            Self::Codes(_) => "codes",
            Self::Written => "written",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageShape;

    #[test]
    fn test_request_wire_format() {
        let req = WorkerRequest::Snapshot {
            step: 25,
            path: PathBuf::from("ckpt/step_00000025.ckpt"),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "snapshot");
        assert_eq!(json["step"], 25);
        assert_eq!(
            serde_json::to_string(&WorkerRequest::Shutdown).unwrap(),
            r#"{"op":"shutdown"}"#
        );
    }

    #[test]
    fn test_step_carries_batches() {
        let batch = Batch {
            shape: ImageShape::new(1, 1, 2),
            size: 1,
            images: vec![0.0, 1.0],
            factors: Vec::new(),
        };
        let json = serde_json::to_value(WorkerRequest::Step {
            iteration: 3,
            real: vec![batch.clone(), batch],
        })
        .unwrap();
        assert_eq!(json["real"].as_array().unwrap().len(), 2);
        assert!(json["real"][0].get("factors").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let losses: WorkerResponse = serde_json::from_str(
            r#"{"status":"losses","critic_loss":-1.5,"generator_loss":0.7,"mi_loss":0.1}"#,
        )
        .unwrap();
        assert_eq!(losses.status(), "losses");
        assert!(matches!(losses, WorkerResponse::Losses(l) if l.generator_loss == 0.7));

        let codes: WorkerResponse =
            serde_json::from_str(r#"{"status":"codes","rows":1,"cols":2,"data":[0.5,-0.5]}"#)
                .unwrap();
        assert!(matches!(codes, WorkerResponse::Codes(ref m) if m.cols() == 2));

        let err: WorkerResponse =
            serde_json::from_str(r#"{"status":"error","message":"cuda oom"}"#).unwrap();
        assert_eq!(
            err,
            WorkerResponse::Error {
                message: "cuda oom".into()
            }
        );
    }
}
