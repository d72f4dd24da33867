//! Writers and readers for the artifacts of a run.
//!
//! A run produces three files in its output directory:
//! * `res_<label>.xml` - the score, plus any traffic light timing plans it was produced with
//! * `<label>_pins.bin.lz4` - the average visit rate grid
//! * `<label>_speed.bin.lz4` - the average speed grid
//!
//! Grids are `bincode`-encoded [GridArray]s, LZ4 compressed with the
//! uncompressed size prepended. They embed their bounds, so cell indices can be
//! mapped back to map coordinates.

use crate::aggregator::RunSummary;
use crate::error::{Error, Result};
use crate::grid::GridArray;
use crate::score::{format_decimal, ScoreRecord};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// The file locations of a run's artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub score: PathBuf,
    pub pins: PathBuf,
    pub speed: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl AsRef<Path>, label: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            score: dir.join(format!("res_{}.xml", label)),
            pins: dir.join(format!("{}_pins.bin.lz4", label)),
            speed: dir.join(format!("{}_speed.bin.lz4", label)),
        }
    }
}

/// Writes all artifacts of a run into `dir`.
///
/// # Parameters
/// * `dir` - The output directory, which must exist
/// * `label` - Distinguishes this run's files from others in the directory
/// * `summary` - The finalized run
/// * `timing_plans` - `tlLogic` elements to embed in the score file
pub fn write_run(
    dir: impl AsRef<Path>,
    label: &str,
    summary: &RunSummary,
    timing_plans: &[Event<'static>],
) -> Result<ArtifactPaths> {
    let paths = ArtifactPaths::new(dir, label);

    let mut file = BufWriter::new(File::create(&paths.score)?);
    write_score(&mut file, &summary.score, timing_plans)?;
    file.flush()?;

    write_grid_array(&paths.pins, &summary.grid.average_visit_rate)?;
    write_grid_array(&paths.speed, &summary.grid.average_speed)?;
    Ok(paths)
}

/// Writes the score document:
///
/// ```xml
/// <data>
///   <score ambTime=".." ambAvgSpeed=".." routeLength=".." allAvgSpeed=".." value=".."/>
///   <tlLogic ...>...</tlLogic>
/// </data>
/// ```
pub fn write_score<W: Write>(
    out: W,
    score: &ScoreRecord,
    timing_plans: &[Event<'static>],
) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Start(BytesStart::new("data")))?;

    let mut elem = BytesStart::new("score");
    for (name, value) in score.attributes() {
        elem.push_attribute((name, format_decimal(value).as_str()));
    }
    writer.write_event(Event::Empty(elem))?;

    for event in timing_plans {
        writer.write_event(event)?;
    }
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

/// Reads the score back out of a score document.
pub fn read_score<R: BufRead>(input: R) -> Result<Option<ScoreRecord>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"score" => {
                let mut score = ScoreRecord::default();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let field = match attr.key.as_ref() {
                        b"ambTime" => &mut score.window_duration,
                        b"ambAvgSpeed" => &mut score.priority_avg_speed,
                        b"routeLength" => &mut score.route_length,
                        b"allAvgSpeed" => &mut score.overall_avg_speed,
                        b"value" => &mut score.value,
                        _ => continue,
                    };
                    let text = attr.unescape_value()?;
                    *field = text.trim().parse::<f64>().map_err(|_| {
                        Error::malformed(
                            position,
                            format!(
                                "score attribute {} is not a number: {:?}",
                                String::from_utf8_lossy(attr.key.as_ref()),
                                text
                            ),
                        )
                    })?;
                }
                return Ok(Some(score));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Collects every `tlLogic` element of a SUMO network, including its
/// `phase` children, so they can be embedded in a score document.
pub fn read_timing_plans<R: BufRead>(input: R) -> Result<Vec<Event<'static>>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut events = vec![];
    let mut depth = 0usize;
    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf)?;
        let keep = match &event {
            Event::Eof => break,
            Event::Start(e) if depth > 0 || e.name().as_ref() == b"tlLogic" => {
                depth += 1;
                true
            }
            Event::Empty(e) => depth > 0 || e.name().as_ref() == b"tlLogic",
            Event::End(_) if depth > 0 => {
                depth -= 1;
                true
            }
            _ => false,
        };
        if keep {
            events.push(event.into_owned());
        }
    }
    Ok(events)
}

/// Reads the timing plans out of a SUMO network file.
pub fn load_timing_plans(path: impl AsRef<Path>) -> Result<Vec<Event<'static>>> {
    read_timing_plans(BufReader::new(File::open(path)?))
}

/// Encodes and compresses a grid array.
pub fn encode_grid_array(array: &GridArray) -> Result<Vec<u8>> {
    let encoded = bincode::serialize(array)?;
    Ok(lz4_flex::compress_prepend_size(&encoded))
}

/// Decompresses and decodes a grid array.
pub fn decode_grid_array(bytes: &[u8]) -> Result<GridArray> {
    let encoded = lz4_flex::decompress_size_prepended(bytes)?;
    Ok(bincode::deserialize(&encoded)?)
}

pub fn write_grid_array(path: impl AsRef<Path>, array: &GridArray) -> Result<()> {
    std::fs::write(path, encode_grid_array(array)?)?;
    Ok(())
}

pub fn read_grid_array(path: impl AsRef<Path>) -> Result<GridArray> {
    decode_grid_array(&std::fs::read(path)?)
}

#[cfg(test)]
mod test {
    use super::{decode_grid_array, encode_grid_array, read_score, read_timing_plans, write_score};
    use crate::grid::{GridBounds, SpatialGrid};
    use crate::score::ScoreRecord;
    use crate::util::Interval;
    use crate::Error;

    const NET: &str = r#"<net version="1.9">
    <edge id="e1" from="a" to="b"/>
    <tlLogic id="j1" type="static" programID="0" offset="0">
        <phase duration="31" state="GGrr"/>
        <phase duration="4" state="yyrr"/>
    </tlLogic>
    <junction id="j1" type="traffic_light" x="0" y="0"/>
</net>"#;

    fn score() -> ScoreRecord {
        ScoreRecord {
            window_duration: 250.0,
            priority_avg_speed: 9.5,
            route_length: 2312.25,
            overall_avg_speed: 7.0,
            value: 9.5 * 0.6 / 30.0 + 7.0 * 0.4 / 30.0,
        }
    }

    #[test]
    fn score_attribute_order() {
        let mut out = vec![];
        write_score(&mut out, &score(), &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let amb_time = text.find("ambTime=\"250.0\"").unwrap();
        let amb_speed = text.find("ambAvgSpeed=\"9.5\"").unwrap();
        let route = text.find("routeLength=\"2312.25\"").unwrap();
        let all_speed = text.find("allAvgSpeed=\"7.0\"").unwrap();
        let value = text.find("value=").unwrap();
        assert!(amb_time < amb_speed && amb_speed < route && route < all_speed && all_speed < value);
        assert!(text.starts_with("<data>"));
        assert!(text.trim_end().ends_with("</data>"));

        let parsed = read_score(text.as_bytes()).unwrap().unwrap();
        assert_eq!(parsed, score());
    }

    #[test]
    fn unparsable_score_attribute_is_malformed() {
        let xml = r#"<data><score ambTime="oops" ambAvgSpeed="1.0" routeLength="2.0" allAvgSpeed="3.0" value="0.1"/></data>"#;
        assert!(matches!(
            read_score(xml.as_bytes()),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn timing_plans_are_embedded() {
        let plans = read_timing_plans(NET.as_bytes()).unwrap();
        // tlLogic start, two phases, tlLogic end
        assert_eq!(plans.len(), 4);

        let mut out = vec![];
        write_score(&mut out, &score(), &plans).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"<tlLogic id="j1""#));
        assert!(text.contains(r#"<phase duration="4" state="yyrr"/>"#));
        assert!(!text.contains("junction"));
        assert!(text.find("<score").unwrap() < text.find("<tlLogic").unwrap());
    }

    #[test]
    fn grid_array_survives_compression() {
        let bounds = GridBounds {
            x: Interval::new(100.0, 160.0),
            y: Interval::new(-30.0, 0.0),
            cell_size: 20.0,
        };
        let mut grid = SpatialGrid::new(bounds);
        grid.record(150.0, -1.0, 12.0);
        let snapshot = grid.finalize(3.0).unwrap();

        let bytes = encode_grid_array(&snapshot.average_speed).unwrap();
        let decoded = decode_grid_array(&bytes).unwrap();
        assert_eq!(decoded, snapshot.average_speed);
        assert_eq!(decoded.bounds.x.min, 100.0);
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.get(2, 1), Some(4.0));
    }

    #[test]
    fn garbage_is_not_a_grid() {
        assert!(decode_grid_array(&[1, 2, 3]).is_err());
    }
}
