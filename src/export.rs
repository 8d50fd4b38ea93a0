//! Batch export: every frame as a numbered still, then an external tool
//! stitches the stills into an animated GIF.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{debug, info};

use crate::{
    error::{ExportError, RenderError},
    frame::{FrameRenderer, FrameState},
    timeseries::PriceSeries,
};

const MIN_PAD_WIDTH: usize = 3;
const FRAME_PREFIX: &str = "frame_";
const FRAME_SUFFIX: &str = ".png";

/// Anything that can turn one frame into a file.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &FrameState, path: &Path) -> Result<(), RenderError>;
}

/// Turns an ordered list of stills into one animated artifact.
pub trait SequenceAssembler {
    fn assemble(&self, frames: &[PathBuf], output: &Path) -> Result<(), ExportError>;
}

/// Digits used for frame numbers of a `len`-frame export.
pub fn pad_width(len: usize) -> usize {
    let last = len.saturating_sub(1);
    last.to_string().len().max(MIN_PAD_WIDTH)
}

pub fn frame_file_name(index: usize, width: usize) -> String {
    format!("{}{:0width$}{}", FRAME_PREFIX, index, FRAME_SUFFIX, width = width)
}

pub struct FrameExporter {
    dir: PathBuf,
}

impl FrameExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FrameExporter { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deletes `frame_*.png` files left in the directory; anything else is kept.
    fn clear_frames(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_frame = name
                .to_str()
                .map_or(false, |n| n.starts_with(FRAME_PREFIX) && n.ends_with(FRAME_SUFFIX));
            if is_frame && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Writes frames `0..len` and returns their paths in playback order.
    pub fn export<S: FrameSink>(
        &self,
        renderer: &FrameRenderer,
        series: &PriceSeries,
        sink: &mut S,
    ) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::FrameDir {
            path: self.dir.clone(),
            source,
        })?;
        let removed = self.clear_frames().map_err(|source| ExportError::FrameDir {
            path: self.dir.clone(),
            source,
        })?;
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "removed frames of an earlier export");
        }

        let width = pad_width(series.len());
        let mut written = Vec::with_capacity(series.len());
        for index in 0..series.len() {
            let frame = renderer.render(series, index);
            let path = self.dir.join(frame_file_name(index, width));
            sink.write_frame(&frame, &path)
                .map_err(|source| ExportError::Frame { index, source })?;
            debug!(index, path = %path.display(), "frame written");
            written.push(path);
        }
        info!(frames = written.len(), dir = %self.dir.display(), "exported frames");
        Ok(written)
    }
}

/// ImageMagick invocation: `<program> -delay <delay> -loop <loop_count> frames... output`.
///
/// `delay` is in hundredths of a second; `loop_count = 0` loops forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMagick {
    pub program: String,
    pub delay: u32,
    pub loop_count: u32,
}

impl Default for ImageMagick {
    fn default() -> Self {
        ImageMagick {
            program: String::from("magick"),
            delay: 10,
            loop_count: 0,
        }
    }
}

impl ImageMagick {
    pub fn command(&self, frames: &[PathBuf], output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-delay")
            .arg(self.delay.to_string())
            .arg("-loop")
            .arg(self.loop_count.to_string())
            .args(frames)
            .arg(output);
        cmd
    }
}

impl SequenceAssembler for ImageMagick {
    fn assemble(&self, frames: &[PathBuf], output: &Path) -> Result<(), ExportError> {
        if frames.is_empty() {
            return Err(ExportError::NoFrames);
        }
        let status = self
            .command(frames, output)
            .status()
            .map_err(|source| ExportError::AssemblerSpawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ExportError::AssemblerFailed {
                program: self.program.clone(),
                status,
            });
        }
        info!(gif = %output.display(), frames = frames.len(), "assembled animation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{frame_file_name, pad_width, ImageMagick};

    #[test]
    fn pads_to_fixed_width() {
        assert_eq!(pad_width(0), 3);
        assert_eq!(pad_width(5), 3);
        assert_eq!(pad_width(1000), 3);
        assert_eq!(pad_width(1001), 4);
        assert_eq!(frame_file_name(7, 3), "frame_007.png");
        assert_eq!(frame_file_name(1234, 4), "frame_1234.png");
    }

    #[test]
    fn names_sort_like_numbers() {
        let width = pad_width(120);
        let mut names: Vec<String> = (0..120).map(|i| frame_file_name(i, width)).collect();
        let in_order = names.clone();
        names.sort();
        assert_eq!(names, in_order);
    }

    #[test]
    fn builds_magick_arguments() {
        let frames = vec![PathBuf::from("f/frame_000.png"), PathBuf::from("f/frame_001.png")];
        let cmd = ImageMagick::default().command(&frames, Path::new("out.gif"));
        assert_eq!(cmd.get_program(), "magick");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-delay", "10", "-loop", "0", "f/frame_000.png", "f/frame_001.png", "out.gif"]
        );
    }
}
