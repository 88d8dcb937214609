//! Toolkit backed by real command-line binaries.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::config::ToolkitConfig;
use super::traits::MediaToolkit;
use super::types::WebpJob;
use crate::process::{run_command, ProcessError};

/// Runs `file`, `sha256sum`, `stat`, `df`, `cwebp` and `ffmpeg`.
pub struct CommandToolkit {
    config: ToolkitConfig,
}

impl CommandToolkit {
    /// Creates a new toolkit with the given configuration.
    pub fn new(config: ToolkitConfig) -> Self {
        Self { config }
    }

    /// Creates a toolkit with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ToolkitConfig::default())
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Builds cwebp arguments for a still image.
    fn build_image_args(&self, job: &WebpJob) -> Vec<String> {
        let mut args = vec![
            "-quiet".to_string(),
            "-q".to_string(),
            job.options.quality.to_string(),
        ];

        // Height 0 keeps the aspect ratio
        if job.options.width > 0 {
            args.extend([
                "-resize".to_string(),
                job.options.width.to_string(),
                "0".to_string(),
            ]);
        }

        args.extend([
            job.input_path.to_string_lossy().to_string(),
            "-o".to_string(),
            job.output_path.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Builds ffmpeg arguments for an animated WebP.
    fn build_video_args(&self, job: &WebpJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        // Duration cap
        if job.options.max_secs > 0 {
            args.extend(["-t".to_string(), job.options.max_secs.to_string()]);
        }

        // Scale down while maintaining aspect ratio, only if larger than max
        let width = if job.options.width > 0 {
            job.options.width
        } else {
            u32::MAX
        };
        let height = if job.options.height > 0 {
            job.options.height
        } else {
            u32::MAX
        };
        args.extend([
            "-vf".to_string(),
            format!(
                "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
                width, height
            ),
        ]);

        args.extend([
            "-c:v".to_string(),
            "libwebp".to_string(),
            "-quality".to_string(),
            job.options.quality.to_string(),
            "-loop".to_string(),
            "0".to_string(),
            "-an".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);

        args.push(job.output_path.to_string_lossy().to_string());
        args
    }

    /// Reads the mime type from `file --mime-type -b` output.
    fn parse_mime(output: &str) -> Option<String> {
        let mime = output.lines().next()?.trim();
        if mime.contains('/') {
            Some(mime.to_ascii_lowercase())
        } else {
            None
        }
    }

    /// Reads the digest from `<hex> <filename>` output.
    fn parse_hash(output: &str) -> Option<String> {
        let digest = output.split_whitespace().next()?;
        if !digest.is_empty() && digest.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(digest.to_ascii_lowercase())
        } else {
            None
        }
    }

    /// Reads a byte count from `stat -c %s` output.
    fn parse_size(output: &str) -> Option<u64> {
        output.trim().parse().ok()
    }

    /// Reads available bytes from `df -B1 --output=avail` output (header line first).
    fn parse_free_space(output: &str) -> Option<u64> {
        output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()?
            .parse()
            .ok()
    }

    async fn probe(&self, program: &Path, args: &[String]) -> Result<String, ProcessError> {
        run_command(program, args, self.config.probe_timeout()).await
    }

    async fn encode(
        &self,
        program: &Path,
        args: &[String],
        job: &WebpJob,
    ) -> Result<PathBuf, ProcessError> {
        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProcessError::Io {
                    program: program.display().to_string(),
                    source: e,
                })?;
        }
        run_command(program, args, self.config.conversion_timeout()).await?;
        Ok(job.output_path.clone())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[async_trait]
impl MediaToolkit for CommandToolkit {
    fn name(&self) -> &str {
        "command"
    }

    async fn mime_type(&self, path: &Path) -> Result<String, ProcessError> {
        let program = &self.config.file_path;
        let args = ["--mime-type".to_string(), "-b".to_string(), path_arg(path)];
        let output = self.probe(program, &args).await?;
        Self::parse_mime(&output)
            .ok_or_else(|| ProcessError::unexpected_output(program.display().to_string(), output))
    }

    async fn hash(&self, path: &Path) -> Result<String, ProcessError> {
        let program = &self.config.hash_path;
        let output = self.probe(program, &[path_arg(path)]).await?;
        Self::parse_hash(&output)
            .ok_or_else(|| ProcessError::unexpected_output(program.display().to_string(), output))
    }

    async fn file_size(&self, path: &Path) -> Result<u64, ProcessError> {
        let program = &self.config.stat_path;
        let args = ["-c".to_string(), "%s".to_string(), path_arg(path)];
        let output = self.probe(program, &args).await?;
        Self::parse_size(&output)
            .ok_or_else(|| ProcessError::unexpected_output(program.display().to_string(), output))
    }

    async fn free_space(&self, dir: &Path) -> Result<u64, ProcessError> {
        let program = &self.config.df_path;
        let args = [
            "-B1".to_string(),
            "--output=avail".to_string(),
            path_arg(dir),
        ];
        let output = self.probe(program, &args).await?;
        Self::parse_free_space(&output)
            .ok_or_else(|| ProcessError::unexpected_output(program.display().to_string(), output))
    }

    async fn convert_image(&self, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        let args = self.build_image_args(job);
        self.encode(&self.config.cwebp_path, &args, job).await
    }

    async fn convert_video(&self, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        let args = self.build_video_args(job);
        self.encode(&self.config.ffmpeg_path, &args, job).await
    }

    async fn validate(&self) -> Result<(), ProcessError> {
        let checks: [(&PathBuf, &str); 3] = [
            (&self.config.file_path, "--version"),
            (&self.config.cwebp_path, "-version"),
            (&self.config.ffmpeg_path, "-version"),
        ];
        for (program, flag) in checks {
            self.probe(program, &[flag.to_string()]).await?;
        }
        Ok(())
    }
}
