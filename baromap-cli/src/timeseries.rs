//! Post-processing of recorded `time;pressure` CSVs into SQL for the
//! timeseries database: merge in protocol events, collapse station stops,
//! normalize time and pressure, render insert statements.

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use std::io::{self, Read, Write};

/// Timestamps in recorded and protocol files, fractional seconds optional.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, thiserror::Error)]
pub enum TimeseriesError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("timestamp {0:?} does not exist in the configured timezone")]
    NonexistentLocalTime(String),
    #[error("invalid pressure value {value:?}: {source}")]
    InvalidPressure {
        value: String,
        source: std::num::ParseFloatError,
    },
    #[error("arrival follows arrival, missing departure event for arrival @ {0}")]
    MissingDeparture(DateTime<Tz>),
    #[error("time rounding error: {0}")]
    Rounding(#[from] chrono::RoundingError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub recorded: DateTime<Tz>,
    pub pressure: f64,
    pub event: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeseries {
    pub points: Vec<Datapoint>,

    pub time_offset: TimeDelta,
    pub pressure_offset: f64,
}

impl Timeseries {
    pub fn new(points: Vec<Datapoint>) -> Self {
        Self {
            points,
            time_offset: TimeDelta::zero(),
            pressure_offset: 0.0,
        }
    }
}

/// Reads a recorded data file: one header row, then `timestamp;pressure`.
pub fn load_data<R: Read>(reader: R, tz: Tz) -> Result<Timeseries, TimeseriesError> {
    let mut points = Vec::new();

    read_rows(reader, tz, 1, |recorded, fields| {
        let raw = &fields[0];
        let pressure = raw
            .parse::<f64>()
            .map_err(|source| TimeseriesError::InvalidPressure {
                value: raw.clone(),
                source,
            })?;

        points.push(Datapoint {
            recorded,
            pressure,
            event: None,
        });

        Ok(())
    })?;

    Ok(Timeseries::new(points))
}

/// Reads a protocol file: no header, `timestamp;event` rows.
pub fn load_protocol<R: Read>(reader: R, tz: Tz) -> Result<Timeseries, TimeseriesError> {
    let mut points = Vec::new();

    read_rows(reader, tz, 0, |recorded, fields| {
        points.push(Datapoint {
            recorded,
            pressure: 0.0,
            event: Some(fields[0].clone()),
        });

        Ok(())
    })?;

    Ok(Timeseries::new(points))
}

fn read_rows<R: Read>(
    reader: R,
    tz: Tz,
    header_rows: usize,
    mut handler: impl FnMut(DateTime<Tz>, &[String]) -> Result<(), TimeseriesError>,
) -> Result<(), TimeseriesError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;

        if idx < header_rows {
            continue;
        }

        if record.len() < 2 {
            return Err(TimeseriesError::InvalidRecord(format!("{record:?}")));
        }

        let raw_time = &record[0];
        let naive = NaiveDateTime::parse_from_str(raw_time, TIMESTAMP_FORMAT).map_err(
            |source| TimeseriesError::InvalidTimestamp {
                value: raw_time.to_string(),
                source,
            },
        )?;
        // for DST-ambiguous local times, take the earlier instant
        let recorded = tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| TimeseriesError::NonexistentLocalTime(raw_time.to_string()))?;

        let fields: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
        handler(recorded, &fields)?;
    }

    Ok(())
}

/// Annotates each protocol event onto the first data point recorded after
/// it. Later events overwrite earlier ones landing on the same point.
pub fn combine(data: &Timeseries, protocol: &Timeseries) -> Timeseries {
    let mut result = data.clone();

    for event_point in &protocol.points {
        let Some(event) = &event_point.event else {
            continue;
        };

        if let Some(point) = result
            .points
            .iter_mut()
            .find(|p| p.recorded > event_point.recorded)
        {
            point.event = Some(event.clone());
        }
    }

    result
}

/// Drops data points before the first and after the last annotated point.
pub fn trim_to_event_range(mut data: Timeseries) -> Timeseries {
    if let Some(first) = data.points.iter().position(|p| p.event.is_some()) {
        data.points.drain(..first);
    }

    if let Some(last) = data.points.iter().rposition(|p| p.event.is_some()) {
        data.points.truncate(last + 1);
    }

    data
}

/// Replaces each arrival..departure span with two points `stop_duration`
/// apart at the span's average pressure, shifting everything after it by
/// the accumulated difference.
pub fn collapse_stops(
    data: &Timeseries,
    stop_duration: TimeDelta,
) -> Result<Timeseries, TimeseriesError> {
    if data.points.len() < 2 {
        return Ok(data.clone());
    }

    let points = &data.points;
    let mut result = Timeseries::new(Vec::new());
    let mut time_shift = TimeDelta::zero();

    let mut i = 0;
    while i < points.len() {
        let point = &points[i];

        if is_arrival(point) {
            let mut departure = None;
            let mut pressures = vec![point.pressure];

            for (j, j_point) in points.iter().enumerate().skip(i + 1) {
                if is_arrival(j_point) {
                    return Err(TimeseriesError::MissingDeparture(point.recorded));
                }

                pressures.push(j_point.pressure);

                if is_departure(j_point) {
                    departure = Some(j);
                    break;
                }
            }

            if let Some(departure) = departure {
                let pressure = average(&pressures);
                let departure_point = &points[departure];

                // two points forming a straight line of the configured length
                result.points.push(Datapoint {
                    recorded: point.recorded + time_shift,
                    pressure,
                    event: point.event.clone(),
                });
                result.points.push(Datapoint {
                    recorded: point.recorded + time_shift + stop_duration,
                    pressure,
                    event: departure_point.event.clone(),
                });

                let actual_duration = departure_point.recorded - point.recorded;
                time_shift = time_shift + (stop_duration - actual_duration);

                i = departure + 1;
                continue;
            }
            // no departure before end-of-data: keep the arrival as a plain point
        }

        result.points.push(Datapoint {
            recorded: point.recorded + time_shift,
            ..point.clone()
        });
        i += 1;
    }

    Ok(result)
}

/// Rounds the start of the series to the nearest hour (plus the optional
/// extra shift) and rebases pressures on `base_pressure`, defaulting to the
/// first point's value.
pub fn normalize(
    data: &Timeseries,
    time_shift: Option<TimeDelta>,
    base_pressure: Option<f64>,
) -> Result<Timeseries, TimeseriesError> {
    let mut result = data.clone();

    let Some(first) = data.points.first() else {
        return Ok(result);
    };

    let start = first.recorded;
    let mut offset = start.duration_round(TimeDelta::hours(1))? - start;
    if let Some(shift) = time_shift {
        offset = offset + shift;
    }

    let base = base_pressure.unwrap_or(first.pressure);

    result.time_offset = offset;
    result.pressure_offset = base;

    for point in &mut result.points {
        point.recorded = point.recorded + offset;
        point.pressure -= base;
    }

    Ok(result)
}

fn is_arrival(p: &Datapoint) -> bool {
    p.event.as_deref().is_some_and(|e| e.ends_with(" an"))
}

fn is_departure(p: &Datapoint) -> bool {
    p.event.as_deref().is_some_and(|e| e.ends_with(" ab"))
}

fn average(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Writes the series as one SQL transaction of insert statements.
pub fn render_sql<W: Write>(
    out: &mut W,
    data: &Timeseries,
    filename: &str,
    run_id: &str,
) -> io::Result<()> {
    writeln!(out, "-- input file.....: {filename}")?;
    writeln!(out, "-- time offset....: {}", data.time_offset)?;
    writeln!(out, "-- pressure offset: {} hPa", data.pressure_offset)?;
    writeln!(out)?;
    writeln!(out, "BEGIN;")?;

    for point in &data.points {
        let comment = match &point.event {
            Some(event) => format!("'{event}'"),
            None => "NULL".to_string(),
        };

        writeln!(
            out,
            r#"INSERT INTO baromap ("time", "run_id", "pressure", "comment") VALUES ('{}', '{run_id}', {}, {comment});"#,
            point.recorded.format(TIMESTAMP_FORMAT),
            point.pressure,
        )?;
    }

    writeln!(out, "COMMIT;")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2023, 5, 1, hour, min, sec).unwrap()
    }

    fn point(recorded: DateTime<Tz>, pressure: f64, event: Option<&str>) -> Datapoint {
        Datapoint {
            recorded,
            pressure,
            event: event.map(str::to_string),
        }
    }

    #[test]
    fn load_data_skips_the_header_row() {
        let input = "time;pressure\n\
                     2023-05-01T10:00:00.123456;1013.25\n\
                     2023-05-01T10:00:00.323456;1013.5\n";

        let ts = load_data(input.as_bytes(), Tz::UTC).unwrap();

        assert_eq!(ts.points.len(), 2);
        assert_eq!(ts.points[0].pressure, 1013.25);
        assert_eq!(
            ts.points[0].recorded,
            at(10, 0, 0).with_nanosecond(123_456_000).unwrap()
        );
        assert_eq!(ts.points[1].pressure, 1013.5);
        assert!(ts.points.iter().all(|p| p.event.is_none()));
    }

    #[test]
    fn load_data_accepts_whole_second_timestamps() {
        let input = "time;pressure\n2023-05-01T10:00:00;1000\n";

        let ts = load_data(input.as_bytes(), Tz::UTC).unwrap();

        assert_eq!(ts.points[0].recorded, at(10, 0, 0));
        assert_eq!(ts.points[0].pressure, 1000.0);
    }

    #[test]
    fn load_data_rejects_garbage_pressure() {
        let input = "time;pressure\n2023-05-01T10:00:00;not-a-number\n";

        assert!(matches!(
            load_data(input.as_bytes(), Tz::UTC),
            Err(TimeseriesError::InvalidPressure { .. })
        ));
    }

    #[test]
    fn load_data_rejects_garbage_timestamps() {
        let input = "time;pressure\nyesterday;1000\n";

        assert!(matches!(
            load_data(input.as_bytes(), Tz::UTC),
            Err(TimeseriesError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn load_data_rejects_single_column_records() {
        let input = "time;pressure\n2023-05-01T10:00:00\n";

        assert!(matches!(
            load_data(input.as_bytes(), Tz::UTC),
            Err(TimeseriesError::InvalidRecord(_))
        ));
    }

    #[test]
    fn load_data_interprets_timestamps_in_the_given_timezone() {
        let input = "time;pressure\n2023-05-01T10:00:00;1000\n";

        let ts = load_data(input.as_bytes(), Tz::Europe__Berlin).unwrap();

        // CEST is UTC+2 in May
        assert_eq!(ts.points[0].recorded, at(8, 0, 0));
    }

    #[test]
    fn load_protocol_has_no_header_row() {
        let input = "2023-05-01T10:00:30;Kottbusser Tor an\n\
                     2023-05-01T10:01:30;Kottbusser Tor ab\n";

        let ts = load_protocol(input.as_bytes(), Tz::UTC).unwrap();

        assert_eq!(ts.points.len(), 2);
        assert_eq!(ts.points[0].event.as_deref(), Some("Kottbusser Tor an"));
        assert_eq!(ts.points[1].event.as_deref(), Some("Kottbusser Tor ab"));
    }

    #[test]
    fn combine_annotates_the_first_point_after_each_event() {
        let data = Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, None),
            point(at(10, 1, 0), 2.0, None),
            point(at(10, 2, 0), 3.0, None),
        ]);
        let protocol = Timeseries::new(vec![point(at(10, 0, 30), 0.0, Some("Halt an"))]);

        let combined = combine(&data, &protocol);

        assert_eq!(combined.points[0].event, None);
        assert_eq!(combined.points[1].event.as_deref(), Some("Halt an"));
        assert_eq!(combined.points[2].event, None);
    }

    #[test]
    fn combine_drops_events_after_the_last_point() {
        let data = Timeseries::new(vec![point(at(10, 0, 0), 1.0, None)]);
        let protocol = Timeseries::new(vec![point(at(11, 0, 0), 0.0, Some("zu spät an"))]);

        let combined = combine(&data, &protocol);

        assert!(combined.points.iter().all(|p| p.event.is_none()));
    }

    #[test]
    fn trim_keeps_the_range_between_first_and_last_event() {
        let trimmed = trim_to_event_range(Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, None),
            point(at(10, 1, 0), 2.0, Some("A an")),
            point(at(10, 2, 0), 3.0, None),
            point(at(10, 3, 0), 4.0, Some("A ab")),
            point(at(10, 4, 0), 5.0, None),
        ]));

        let pressures: Vec<_> = trimmed.points.iter().map(|p| p.pressure).collect();
        assert_eq!(pressures, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn trim_without_events_keeps_everything() {
        let trimmed = trim_to_event_range(Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, None),
            point(at(10, 1, 0), 2.0, None),
        ]));

        assert_eq!(trimmed.points.len(), 2);
    }

    #[test]
    fn collapse_replaces_a_stop_with_a_fixed_length_plateau() {
        let data = Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, None),
            point(at(10, 1, 0), 2.0, Some("Südstern an")),
            point(at(10, 2, 0), 4.0, None),
            point(at(10, 3, 0), 6.0, Some("Südstern ab")),
            point(at(10, 4, 0), 3.0, None),
        ]);

        let collapsed = collapse_stops(&data, TimeDelta::seconds(30)).unwrap();

        assert_eq!(collapsed.points.len(), 4);

        assert_eq!(collapsed.points[0], point(at(10, 0, 0), 1.0, None));

        // the stop becomes two points 30s apart at the average pressure
        assert_eq!(
            collapsed.points[1],
            point(at(10, 1, 0), 4.0, Some("Südstern an"))
        );
        assert_eq!(
            collapsed.points[2],
            point(at(10, 1, 30), 4.0, Some("Südstern ab"))
        );

        // the stop shrank from 120s to 30s, so the tail moves up by 90s
        assert_eq!(collapsed.points[3], point(at(10, 2, 30), 3.0, None));
    }

    #[test]
    fn collapse_errors_on_two_arrivals_without_a_departure() {
        let data = Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, Some("A an")),
            point(at(10, 1, 0), 2.0, Some("B an")),
        ]);

        assert!(matches!(
            collapse_stops(&data, TimeDelta::seconds(30)),
            Err(TimeseriesError::MissingDeparture(_))
        ));
    }

    #[test]
    fn collapse_keeps_a_trailing_arrival_without_departure() {
        let data = Timeseries::new(vec![
            point(at(10, 0, 0), 1.0, None),
            point(at(10, 1, 0), 2.0, Some("Endstation an")),
            point(at(10, 2, 0), 3.0, None),
        ]);

        let collapsed = collapse_stops(&data, TimeDelta::seconds(30)).unwrap();

        assert_eq!(collapsed.points, data.points);
    }

    #[test]
    fn normalize_rounds_the_start_to_the_nearest_hour() {
        let data = Timeseries::new(vec![
            point(at(10, 20, 0), 1013.0, None),
            point(at(10, 21, 0), 1014.5, None),
        ]);

        let normalized = normalize(&data, None, None).unwrap();

        assert_eq!(normalized.time_offset, TimeDelta::minutes(-20));
        assert_eq!(normalized.pressure_offset, 1013.0);

        assert_eq!(normalized.points[0].recorded, at(10, 0, 0));
        assert_eq!(normalized.points[0].pressure, 0.0);
        assert_eq!(normalized.points[1].recorded, at(10, 1, 0));
        assert_eq!(normalized.points[1].pressure, 1.5);
    }

    #[test]
    fn normalize_rounds_up_past_the_half_hour() {
        let data = Timeseries::new(vec![point(at(10, 40, 0), 1000.0, None)]);

        let normalized = normalize(&data, None, None).unwrap();

        assert_eq!(normalized.points[0].recorded, at(11, 0, 0));
    }

    #[test]
    fn normalize_applies_explicit_shift_and_base_pressure() {
        let data = Timeseries::new(vec![point(at(10, 0, 0), 1010.0, None)]);

        let normalized =
            normalize(&data, Some(TimeDelta::minutes(30)), Some(1000.0)).unwrap();

        assert_eq!(normalized.points[0].recorded, at(10, 30, 0));
        assert_eq!(normalized.points[0].pressure, 10.0);
        assert_eq!(normalized.pressure_offset, 1000.0);
    }

    #[test]
    fn normalize_of_an_empty_series_is_a_no_op() {
        let normalized = normalize(&Timeseries::new(Vec::new()), None, None).unwrap();

        assert!(normalized.points.is_empty());
        assert_eq!(normalized.time_offset, TimeDelta::zero());
    }

    #[test]
    fn render_sql_wraps_inserts_in_a_transaction() {
        let mut series = Timeseries::new(vec![
            point(at(10, 0, 0), 0.0, None),
            point(at(10, 1, 0), -1.25, Some("Südstern an")),
        ]);
        series.pressure_offset = 1013.0;

        let mut out = Vec::new();
        render_sql(&mut out, &series, "ride.csv", "u7-2023-05-01").unwrap();
        let rendered = String::from_utf8(out).unwrap();
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(lines[0], "-- input file.....: ride.csv");
        assert_eq!(lines[2], "-- pressure offset: 1013 hPa");
        assert_eq!(lines[4], "BEGIN;");
        assert_eq!(
            lines[5],
            r#"INSERT INTO baromap ("time", "run_id", "pressure", "comment") VALUES ('2023-05-01T10:00:00', 'u7-2023-05-01', 0, NULL);"#
        );
        assert_eq!(
            lines[6],
            r#"INSERT INTO baromap ("time", "run_id", "pressure", "comment") VALUES ('2023-05-01T10:01:00', 'u7-2023-05-01', -1.25, 'Südstern an');"#
        );
        assert_eq!(lines[7], "COMMIT;");
    }
}
