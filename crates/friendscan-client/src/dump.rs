use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Writes raw response bodies to `{dir}/{name}.json` for diagnosis.
#[derive(Debug, Clone)]
pub struct ResponseDump {
    dir: PathBuf,
}

impl ResponseDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Membership updates repeat once per batch, so they append; everything
    /// else replaces the previous dump.
    pub fn write(&self, name: &str, body: &[u8], append: bool) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(name);
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }

        let mut file = options.open(&path)?;
        file.write_all(body)?;
        if append {
            file.write_all(b"\n")?;
        }

        debug!("Dumped {} bytes to {}", body.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_truncating_and_appending_dumps() {
        let dir = tempdir().unwrap();
        let dump = ResponseDump::new(dir.path());

        dump.write("webwxinit", b"first", false).unwrap();
        dump.write("webwxinit", b"second", false).unwrap();
        assert_eq!(
            std::fs::read_to_string(dump.path_for("webwxinit")).unwrap(),
            "second"
        );

        dump.write("addmember", b"{\"a\":1}", true).unwrap();
        dump.write("addmember", b"{\"b\":2}", true).unwrap();
        assert_eq!(
            std::fs::read_to_string(dump.path_for("addmember")).unwrap(),
            "{\"a\":1}\n{\"b\":2}\n"
        );
    }
}
