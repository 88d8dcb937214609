//! Converter module: the external tools behind a conversion.
//!
//! This module provides the `MediaToolkit` trait and a command-line
//! implementation. The toolkit covers everything the scheduler asks of the
//! outside world:
//!
//! - Mime sniffing, content hashing and file sizing
//! - Free space probing for admission control
//! - Still images to WebP (cwebp)
//! - Video to animated WebP (ffmpeg), scaled and duration-capped
//!
//! # Example
//!
//! ```ignore
//! use webpit_core::converter::{CommandToolkit, MediaToolkit, OutputOptions, WebpJob};
//!
//! let toolkit = CommandToolkit::with_defaults();
//! toolkit.validate().await?;
//!
//! let mime = toolkit.mime_type(Path::new("files/abc")).await?;
//! let job = WebpJob {
//!     input_path: PathBuf::from("files/abc"),
//!     output_path: PathBuf::from("files/abc.webp"),
//!     options: OutputOptions::default(),
//! };
//! toolkit.convert_image(&job).await?;
//! ```

mod command;
mod config;
mod traits;
mod types;

pub use command::CommandToolkit;
pub use config::ToolkitConfig;
pub use traits::MediaToolkit;
pub use types::{MediaKind, OutputOptions, WebpJob};
