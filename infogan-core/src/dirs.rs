//! Per-experiment directory layout.

use crate::config::RunConfig;
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Logical role of a directory in the experiment layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirRole {
    Root,
    Checkpoints,
    Samples,
    Logs,
    Data,
    Codes,
}

impl DirRole {
    pub const ALL: [DirRole; 6] = [
        DirRole::Root,
        DirRole::Checkpoints,
        DirRole::Samples,
        DirRole::Logs,
        DirRole::Data,
        DirRole::Codes,
    ];
}

/// Filesystem paths for one experiment, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySet {
    pub root: PathBuf,
    pub checkpoints: PathBuf,
    pub samples: PathBuf,
    pub logs: PathBuf,
    pub data: PathBuf,
    pub codes: PathBuf,
}

impl DirectorySet {
    /// Layout for `exp_name` under `output_dir`; codes always live under the data root.
    pub fn new(exp_name: &str, output_dir: &Path, data_dir: &Path) -> Self {
        let root = output_dir.join(exp_name);
        Self {
            checkpoints: root.join("checkpoints"),
            samples: root.join("samples"),
            logs: root.join("logs"),
            root,
            data: data_dir.to_path_buf(),
            codes: data_dir.join("codes"),
        }
    }

    pub fn for_config(config: &RunConfig) -> Self {
        Self::new(&config.exp_name, &config.output_dir, &config.data_dir)
    }

    pub fn path(&self, role: DirRole) -> &Path {
        match role {
            DirRole::Root => &self.root,
            DirRole::Checkpoints => &self.checkpoints,
            DirRole::Samples => &self.samples,
            DirRole::Logs => &self.logs,
            DirRole::Data => &self.data,
            DirRole::Codes => &self.codes,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirRole, &Path)> {
        DirRole::ALL.into_iter().map(move |role| (role, self.path(role)))
    }

    /// Create the directories the requested phases write into.
    ///
    /// Training needs checkpoints, samples and logs; exporting needs the codes directory.
    /// The data root is never created since it must already hold the dataset.
    pub fn create(&self, train: bool, save_codes: bool) -> Result<()> {
        let mut wanted = vec![DirRole::Root];
        if train {
            wanted.extend([DirRole::Checkpoints, DirRole::Samples, DirRole::Logs]);
        }
        if save_codes {
            wanted.push(DirRole::Codes);
        }
        for role in wanted {
            let path = self.path(role);
            std::fs::create_dir_all(path)?;
            debug!(?role, path = %path.display(), "Directory ready");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let dirs = DirectorySet::new("gan_false_resnet_6_8.0", Path::new("out"), Path::new("data"));
        assert_eq!(dirs.root, PathBuf::from("out/gan_false_resnet_6_8.0"));
        assert_eq!(
            dirs.checkpoints,
            PathBuf::from("out/gan_false_resnet_6_8.0/checkpoints")
        );
        assert_eq!(dirs.codes, PathBuf::from("data/codes"));
        assert_eq!(dirs.iter().count(), 6);
        assert_eq!(dirs.path(DirRole::Logs), dirs.logs.as_path());
    }

    #[test]
    fn test_create_only_needed_roles() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        let dirs = DirectorySet::new("exp", tmp.path(), &data);

        dirs.create(false, true).unwrap();
        assert!(dirs.codes.is_dir());
        assert!(!dirs.checkpoints.exists());

        dirs.create(true, false).unwrap();
        assert!(dirs.checkpoints.is_dir());
        assert!(dirs.samples.is_dir());
        assert!(dirs.logs.is_dir());
    }
}
