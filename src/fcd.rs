//! A streaming reader for SUMO floating car data (FCD) output.
//!
//! The file is read one `<timestep>` at a time, so memory use does not grow
//! with the length of the simulation:
//!
//! ```xml
//! <fcd-export>
//!     <timestep time="101.00">
//!         <vehicle id="Amb" x="1200.35" y="840.12" angle="90.00" speed="13.42" .../>
//!     </timestep>
//! </fcd-export>
//! ```

use crate::error::{Error, Result};
use crate::telemetry::{TimestepRecord, VehicleObservation};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Log reading progress after every this many bytes.
const PROGRESS_BYTES: usize = 10 * 1024 * 1024;

/// Pulls [TimestepRecord]s out of an FCD document.
pub struct FcdReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    last_progress: usize,
    done: bool,
}

impl FcdReader<BufReader<File>> {
    /// Opens an FCD file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        log::info!("Reading telemetry from {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> FcdReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            last_progress: 0,
            done: false,
        }
    }

    fn report_progress(&mut self) {
        let position = self.reader.buffer_position() as usize;
        if position - self.last_progress >= PROGRESS_BYTES {
            self.last_progress = position;
            log::info!("Processed {} MB of telemetry", position / (1024 * 1024));
        }
    }

    /// Reads up to and including the end of the next timestep.
    fn next_record(&mut self) -> Result<Option<TimestepRecord>> {
        let mut current: Option<TimestepRecord> = None;
        loop {
            self.report_progress();
            self.buf.clear();
            let position = self.reader.buffer_position() as usize;
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"timestep" => {
                        if let Some(open) = &current {
                            return Err(Error::malformed(
                                position,
                                format!("timestep at t={} is never closed", open.time),
                            ));
                        }
                        current = Some(TimestepRecord::new(parse_time(&e, position)?, vec![]));
                    }
                    b"vehicle" => {
                        if let Some(record) = current.as_mut() {
                            record.observations.push(parse_vehicle(&e, position)?);
                        }
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"timestep" => {
                        return Ok(Some(TimestepRecord::new(parse_time(&e, position)?, vec![])));
                    }
                    b"vehicle" => {
                        if let Some(record) = current.as_mut() {
                            record.observations.push(parse_vehicle(&e, position)?);
                        }
                    }
                    _ => {}
                },
                Event::End(e) if e.name().as_ref() == b"timestep" => {
                    if let Some(record) = current.take() {
                        return Ok(Some(record));
                    }
                }
                Event::Eof => {
                    return match current {
                        Some(record) => Err(Error::malformed(
                            position,
                            format!("timestep at t={} is never closed", record.time),
                        )),
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for FcdReader<R> {
    type Item = Result<TimestepRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn parse_time(e: &BytesStart, position: usize) -> Result<f64> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == b"time" {
            return parse_number(&attr.unescape_value()?, "time", position);
        }
    }
    Err(Error::malformed(position, "timestep has no time"))
}

fn parse_vehicle(e: &BytesStart, position: usize) -> Result<VehicleObservation> {
    let (mut id, mut x, mut y, mut speed) = (None, None, None, None);
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        match attr.key.as_ref() {
            b"id" => id = Some(attr.unescape_value()?.into_owned()),
            b"x" => x = Some(parse_number(&attr.unescape_value()?, "x", position)?),
            b"y" => y = Some(parse_number(&attr.unescape_value()?, "y", position)?),
            b"speed" => speed = Some(parse_number(&attr.unescape_value()?, "speed", position)?),
            _ => {}
        }
    }
    match (id, x, y, speed) {
        (Some(id), Some(x), Some(y), Some(speed)) => Ok(VehicleObservation { id, x, y, speed }),
        (id, ..) => Err(Error::malformed(
            position,
            format!(
                "vehicle {} is missing one of id, x, y, speed",
                id.as_deref().unwrap_or("<unnamed>")
            ),
        )),
    }
}

fn parse_number(value: &str, name: &str, position: usize) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::malformed(
            position,
            format!("{} is not a finite number: {:?}", name, value),
        )),
    }
}
