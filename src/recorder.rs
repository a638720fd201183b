use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::codec::{TrackFormat, TrackMetadata};
use crate::config::RecorderConfig;
use crate::error::{DecodeError, Result, TrackError};
use crate::point::Point;
use crate::statistics::TripStatistics;
use crate::units::{UnitSystem, utc_ms_now, utc_ms_to_gpx_time};

/// Recording state. The discriminants match the stored settings value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i8)]
pub enum RecordingState {
    Paused = -1,
    #[default]
    Stopped = 0,
    Recording = 1,
}

/// Name of a temporary points file: `<track_name>.<ext>_<format-tag>_<units>`.
///
/// Everything a recovery sweep needs is encoded in the name, so a recorder
/// can be rebuilt from the file alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFileName {
    pub track_name: String,
    pub format: TrackFormat,
    pub units: UnitSystem,
}

impl TempFileName {
    /// Parse a temp file name. The split happens at the last dot, so track
    /// names may contain dots and underscores.
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = || TrackError::InvalidTempName(file_name.to_string());

        let (track_name, suffix) = file_name.rsplit_once('.').ok_or_else(invalid)?;
        let mut parts = suffix.split('_');
        let (Some(extension), Some(tag), Some(units), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let format = TrackFormat::from_tag(tag).ok_or_else(invalid)?;
        let units = units.parse::<UnitSystem>().map_err(|_| invalid())?;
        if track_name.is_empty() || format.extension() != extension {
            return Err(invalid());
        }

        Ok(Self {
            track_name: track_name.to_string(),
            format,
            units,
        })
    }

    /// Whether a directory entry looks like a temporary points file.
    pub fn is_candidate(file_name: &str) -> bool {
        file_name.ends_with("_metric") || file_name.ends_with("_imperial")
    }

    pub fn output_file(&self) -> String {
        format!("{}.{}", self.track_name, self.format.extension())
    }
}

impl fmt::Display for TempFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}_{}_{}",
            self.track_name,
            self.format.extension(),
            self.format.tag(),
            self.units
        )
    }
}

/// File names of one recording attempt.
#[derive(Debug, Clone, PartialEq)]
struct TrackFiles {
    output_file: String,
    track_name: String,
    temp_path: PathBuf,
}

/// Streams points of one track into a temporary file and turns it into a
/// final GPX or CSV file on stop.
///
/// Calls that do not fit the current state are ignored, so callers need not
/// track the state themselves. Calls must be serialized by the caller.
#[derive(Debug)]
pub struct TrackRecorder {
    config: RecorderConfig,
    output_file: Option<String>,
    state: RecordingState,
    files: Option<TrackFiles>,
    writer: Option<BufWriter<File>>,
    start_time_ms: Option<i64>,
    stats: TripStatistics,
}

impl TrackRecorder {
    pub fn new(config: RecorderConfig) -> Result<Self> {
        let output_file = config.output_file_name()?;
        Ok(Self {
            config,
            output_file,
            state: RecordingState::Stopped,
            files: None,
            writer: None,
            start_time_ms: None,
            stats: TripStatistics::new(),
        })
    }

    /// Finalize a temporary file left behind by an unclean shutdown.
    ///
    /// Format, units and track name come from the file name; statistics and
    /// start time are recomputed from the stored points. Returns the path
    /// of the final file.
    pub fn recover(temp_path: &Path, base: &RecorderConfig) -> Result<PathBuf> {
        let file_name = temp_path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| TrackError::InvalidTempName(temp_path.display().to_string()))?;
        let temp_name = TempFileName::parse(file_name)?;

        let config = RecorderConfig {
            format: temp_name.format,
            units: temp_name.units,
            output_file: Some(temp_name.output_file()),
            work_path: temp_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            ..base.clone()
        };

        let mut recorder = Self {
            files: Some(TrackFiles {
                output_file: temp_name.output_file(),
                track_name: temp_name.track_name.clone(),
                temp_path: temp_path.to_path_buf(),
            }),
            ..Self::new(config)?
        };
        recorder.finalize(true)
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn statistics(&self) -> &TripStatistics {
        &self.stats
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn track_name(&self) -> Option<&str> {
        self.files.as_ref().map(|f| f.track_name.as_str())
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.temp_path.as_path())
    }

    pub fn start_time_ms(&self) -> Option<i64> {
        self.start_time_ms
    }

    /// Open a fresh temporary file and begin recording.
    /// Returns `false` if the recorder was not stopped.
    pub fn start(&mut self) -> Result<bool> {
        if self.state != RecordingState::Stopped {
            log::debug!("start ignored in state {:?}", self.state);
            return Ok(false);
        }

        let start_time = utc_ms_now();
        let files = self.track_files(start_time);
        fs::create_dir_all(&self.config.work_path).map_err(TrackError::io(&self.config.work_path))?;
        let file = File::create(&files.temp_path).map_err(TrackError::io(&files.temp_path))?;

        self.stats.reset();
        self.start_time_ms = Some(start_time);
        self.writer = Some(BufWriter::new(file));
        log::info!(
            "Started recording {} to {}",
            files.track_name,
            files.temp_path.display()
        );
        self.files = Some(files);
        self.state = RecordingState::Recording;
        Ok(true)
    }

    fn track_files(&self, start_time_ms: i64) -> TrackFiles {
        let format = self.config.format;
        let output_file = self.output_file.clone().unwrap_or_else(|| {
            let stamp = utc_ms_to_gpx_time(start_time_ms).unwrap_or_default();
            format!("Track {}.{}", stamp.replace(':', ""), format.extension())
        });
        let track_name = output_file
            .strip_suffix(&format!(".{}", format.extension()))
            .unwrap_or(&output_file)
            .to_string();
        let temp_name = TempFileName {
            track_name: track_name.clone(),
            format,
            units: self.config.units,
        };
        TrackFiles {
            temp_path: self.config.work_path.join(temp_name.to_string()),
            output_file,
            track_name,
        }
    }

    /// Record one point: update statistics, then append and flush its line.
    ///
    /// Statistics advance even if the write fails. Returns `false` when not
    /// recording.
    pub fn add_point(&mut self, point: &Point) -> Result<bool> {
        if self.state != RecordingState::Recording {
            log::debug!("add_point ignored in state {:?}", self.state);
            return Ok(false);
        }

        self.stats.update(point);
        if self.stats.points_count % 100 == 0 {
            log::debug!("Recorded {} points", self.stats.points_count);
        }

        let line = self.config.format.encode_point(point);
        let (Some(writer), Some(files)) = (self.writer.as_mut(), self.files.as_ref()) else {
            return Err(TrackError::NoActiveTempFile);
        };
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(TrackError::io(&files.temp_path))?;
        Ok(true)
    }

    /// Close the temporary file, keeping its content.
    pub fn pause(&mut self) -> Result<bool> {
        if self.state != RecordingState::Recording {
            log::debug!("pause ignored in state {:?}", self.state);
            return Ok(false);
        }

        self.state = RecordingState::Paused;
        self.close_writer()?;
        log::info!(
            "Recording paused: {} points, {:.0} m, {:.0} s",
            self.stats.points_count,
            self.stats.total_distance_m,
            self.stats.total_duration_s
        );
        Ok(true)
    }

    /// Reopen the temporary file for appending.
    pub fn resume(&mut self) -> Result<bool> {
        if self.state != RecordingState::Paused {
            log::debug!("resume ignored in state {:?}", self.state);
            return Ok(false);
        }

        let temp_path = self
            .files
            .as_ref()
            .map(|f| f.temp_path.clone())
            .ok_or(TrackError::NoActiveTempFile)?;
        let file = OpenOptions::new()
            .append(true)
            .open(&temp_path)
            .map_err(TrackError::io(&temp_path))?;

        self.writer = Some(BufWriter::new(file));
        self.state = RecordingState::Recording;
        log::info!("Resumed recording to {}", temp_path.display());
        Ok(true)
    }

    /// Close the temporary file and write the final file.
    ///
    /// Returns the final path, or `None` if nothing was being recorded. The
    /// recorder is stopped and its statistics reset even when finalizing
    /// fails; the temporary file then stays on disk for a recovery sweep.
    pub fn stop(&mut self) -> Result<Option<PathBuf>> {
        if self.state == RecordingState::Stopped {
            log::debug!("stop ignored, not recording");
            return Ok(None);
        }

        let closed = self.close_writer();
        self.state = RecordingState::Stopped;
        let result = closed.and_then(|_| self.finalize(false));

        log::info!(
            "Recording stopped: {} points, {:.0} m, {:.0} s",
            self.stats.points_count,
            self.stats.total_distance_m,
            self.stats.total_duration_s
        );
        self.stats.reset();
        self.files = None;
        self.start_time_ms = None;
        result.map(Some)
    }

    /// Write header, stored point lines and footer to the final file, then
    /// delete the temporary file.
    ///
    /// With `reconstruct`, statistics and start time are recomputed by
    /// decoding the temporary file instead of taken from memory.
    pub fn finalize(&mut self, reconstruct: bool) -> Result<PathBuf> {
        self.state = RecordingState::Stopped;
        self.close_writer()?;
        let files = self.files.clone().ok_or(TrackError::NoActiveTempFile)?;
        let format = self.config.format;

        let content =
            fs::read_to_string(&files.temp_path).map_err(TrackError::io(&files.temp_path))?;

        if reconstruct {
            let points = format.decode_points(&content)?;
            if points.is_empty() {
                return Err(DecodeError::Empty.into());
            }
            self.stats.reset();
            for point in &points {
                self.stats.update(point);
            }
            self.start_time_ms = points.iter().filter_map(|p| p.time_ms_utc).min();
        }

        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let metadata = TrackMetadata {
            creator: self.config.creator.clone(),
            units: self.config.units,
            activity: self.config.activity.clone(),
            track_name: files.track_name.clone(),
            start_time_ms: self.start_time_ms,
            link: self.config.link.clone(),
        };
        let document = format.render_document(&self.stats, &metadata, &lines);

        let output_path = self.config.work_path.join(&files.output_file);
        write_exclusive(&output_path, document.as_bytes())?;
        fs::remove_file(&files.temp_path).map_err(TrackError::io(&files.temp_path))?;
        log::info!(
            "Final file {} created from {} points",
            output_path.display(),
            lines.len()
        );

        Ok(output_path)
    }

    fn close_writer(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let path = self.temp_path().map(Path::to_path_buf).unwrap_or_default();
        writer
            .into_inner()
            .map_err(|e| TrackError::io(&path)(e.into_error()))?;
        Ok(())
    }
}

/// Create `path` and write `bytes`, failing if the file already exists.
fn write_exclusive(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(TrackError::Collision(path.to_path_buf()));
        }
        Err(e) => return Err(TrackError::io(path)(e)),
    };
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(TrackError::io(path))
}
