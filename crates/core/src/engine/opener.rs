//! Opening finished outputs with the desktop's default application.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Something that can show a converted file to the user.
#[async_trait]
pub trait ResultOpener: Send + Sync {
    async fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// Opens files with the platform launcher (`xdg-open`, `open` or `cmd /C start`).
#[derive(Debug, Clone, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(path: &Path) -> Command {
        if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            cmd
        }
    }
}

#[async_trait]
impl ResultOpener for SystemOpener {
    async fn open(&self, path: &Path) -> std::io::Result<()> {
        let status = Self::command(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(std::io::Error::other(format!(
                "launcher exited with {}",
                status
            )));
        }
        Ok(())
    }
}

/// Opener that does nothing, for headless deployments.
#[derive(Debug, Clone, Default)]
pub struct NoopOpener;

#[async_trait]
impl ResultOpener for NoopOpener {
    async fn open(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_command_targets_path() {
        let cmd = SystemOpener::command(Path::new("/tmp/a.mp4"));
        let std_cmd = cmd.as_std();
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args.last().unwrap().to_str(), Some("/tmp/a.mp4"));
    }

    #[tokio::test]
    async fn test_noop_opener() {
        assert!(NoopOpener.open(Path::new("/nowhere")).await.is_ok());
    }
}
