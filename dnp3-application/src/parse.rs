//! Object header parser

use crate::cursor::ReadCursor;
use crate::file::{FileCommand, FileCommandStatus, FileTransport};
use crate::measurement::decode_measurement;
use crate::objects::{CommandObject, HeaderRange, ObjectData, ObjectHeader, QualifierCode};
use crate::variation::Variation;
use dnp3_core::{
    AnalogOutput, CommandStatus, Control, ControlCode, Crob, Dnp3Error, Dnp3Result,
};
use std::time::Duration;

/// Parse every object header in `data`
///
/// # Arguments
///
/// * `data` - Bytes following the application header
/// * `has_data` - Whether ranged and counted headers are followed by object data.
///   This is false for READ requests, which only name objects.
///
/// # Errors
///
/// * `Dnp3Error::UnknownObject` for a group/variation this implementation does not know
/// * `Dnp3Error::UnsupportedQualifier` for an unknown qualifier byte
/// * `Dnp3Error::FragmentInvalid` for truncated data, bad ranges, or a qualifier that
///   is not valid for the variation
pub fn parse_object_headers(data: &[u8], has_data: bool) -> Dnp3Result<Vec<ObjectHeader>> {
    let mut cursor = ReadCursor::new(data);
    let mut headers = Vec::new();
    while !cursor.is_empty() {
        let header = parse_header(&mut cursor, has_data)?;
        log::trace!(
            "object header {} qualifier 0x{:02X} {:?}",
            header.variation,
            header.qualifier.as_u8(),
            header.range
        );
        headers.push(header);
    }
    Ok(headers)
}

fn invalid(variation: Variation, qualifier: QualifierCode) -> Dnp3Error {
    Dnp3Error::FragmentInvalid(format!(
        "qualifier 0x{:02X} is not valid for {}",
        qualifier.as_u8(),
        variation
    ))
}

fn parse_header(cursor: &mut ReadCursor<'_>, has_data: bool) -> Dnp3Result<ObjectHeader> {
    let group = cursor.read_u8()?;
    let var = cursor.read_u8()?;
    let qualifier_byte = cursor.read_u8()?;

    let variation = Variation::from_group_var(group, var).ok_or(Dnp3Error::UnknownObject {
        group,
        variation: var,
    })?;
    let qualifier = QualifierCode::from_u8(qualifier_byte)
        .ok_or(Dnp3Error::UnsupportedQualifier(qualifier_byte))?;

    let range = match qualifier {
        QualifierCode::Range8 => {
            let start = cursor.read_u8()?;
            let stop = cursor.read_u8()?;
            checked_range(u16::from(start), u16::from(stop))?
        }
        QualifierCode::Range16 => {
            let start = cursor.read_u16()?;
            let stop = cursor.read_u16()?;
            checked_range(start, stop)?
        }
        QualifierCode::AllObjects => HeaderRange::All,
        QualifierCode::Count8 | QualifierCode::CountAndPrefix8 | QualifierCode::FreeFormat16 => {
            HeaderRange::Count(u16::from(cursor.read_u8()?))
        }
        QualifierCode::Count16 | QualifierCode::CountAndPrefix16 => {
            HeaderRange::Count(cursor.read_u16()?)
        }
    };

    let data = match (qualifier, range) {
        (QualifierCode::AllObjects, _) => {
            if variation.layout().is_some() && has_data {
                return Err(invalid(variation, qualifier));
            }
            ObjectData::None
        }
        (QualifierCode::FreeFormat16, HeaderRange::Count(count)) => {
            parse_free_format(cursor, variation, count)?
        }
        _ if !has_data => {
            if qualifier.is_prefixed() {
                return Err(invalid(variation, qualifier));
            }
            ObjectData::None
        }
        _ => parse_data(cursor, variation, qualifier, range)?,
    };

    Ok(ObjectHeader::new(variation, qualifier, range, data))
}

fn checked_range(start: u16, stop: u16) -> Dnp3Result<HeaderRange> {
    if start > stop {
        return Err(Dnp3Error::FragmentInvalid(format!(
            "range start {} is greater than stop {}",
            start, stop
        )));
    }
    Ok(HeaderRange::Range { start, stop })
}

/// Indices named by a range or read from each object's prefix
fn read_index(cursor: &mut ReadCursor<'_>, qualifier: QualifierCode) -> Dnp3Result<u16> {
    match qualifier {
        QualifierCode::CountAndPrefix8 => Ok(u16::from(cursor.read_u8()?)),
        _ => cursor.read_u16(),
    }
}

fn for_each_object<T>(
    cursor: &mut ReadCursor<'_>,
    variation: Variation,
    qualifier: QualifierCode,
    range: HeaderRange,
    mut decode: impl FnMut(&mut ReadCursor<'_>) -> Dnp3Result<T>,
) -> Dnp3Result<Vec<(u16, T)>> {
    let mut items = Vec::new();
    match range {
        HeaderRange::Range { start, stop } => {
            for index in start..=stop {
                items.push((index, decode(cursor)?));
            }
        }
        HeaderRange::Count(count) if qualifier.is_prefixed() => {
            for _ in 0..count {
                let index = read_index(cursor, qualifier)?;
                items.push((index, decode(cursor)?));
            }
        }
        _ => return Err(invalid(variation, qualifier)),
    }
    Ok(items)
}

fn single_count(
    variation: Variation,
    qualifier: QualifierCode,
    range: HeaderRange,
) -> Dnp3Result<()> {
    match (qualifier, range) {
        (QualifierCode::Count8 | QualifierCode::Count16, HeaderRange::Count(1)) => Ok(()),
        _ => Err(invalid(variation, qualifier)),
    }
}

fn parse_data(
    cursor: &mut ReadCursor<'_>,
    variation: Variation,
    qualifier: QualifierCode,
    range: HeaderRange,
) -> Dnp3Result<ObjectData> {
    if variation.layout().is_some() {
        let items = for_each_object(cursor, variation, qualifier, range, |c| {
            decode_measurement(variation, c)
        })?;
        return Ok(ObjectData::Measurements(items));
    }

    match variation {
        Variation::Group12Var1
        | Variation::Group41Var1
        | Variation::Group41Var2
        | Variation::Group41Var3
        | Variation::Group41Var4 => {
            let items = for_each_object(cursor, variation, qualifier, range, |c| {
                decode_command(variation, c)
            })?;
            let commands = items
                .into_iter()
                .map(|(index, (control, status))| CommandObject {
                    index,
                    control,
                    status,
                })
                .collect();
            Ok(ObjectData::Commands(commands))
        }
        Variation::Group50Var1 | Variation::Group50Var3 => {
            single_count(variation, qualifier, range)?;
            Ok(ObjectData::Time(cursor.read_timestamp()?))
        }
        Variation::Group52Var1 => {
            single_count(variation, qualifier, range)?;
            Ok(ObjectData::Delay(Duration::from_secs(u64::from(cursor.read_u16()?))))
        }
        Variation::Group52Var2 => {
            single_count(variation, qualifier, range)?;
            Ok(ObjectData::Delay(Duration::from_millis(u64::from(cursor.read_u16()?))))
        }
        Variation::Group80Var1 => match range {
            HeaderRange::Range { start, stop } => {
                let count = usize::from(stop - start) + 1;
                let bytes = cursor.read_bytes(count.div_ceil(8))?;
                let bits = (0..count)
                    .map(|i| {
                        let set = bytes[i / 8] & (1 << (i % 8)) != 0;
                        (start + i as u16, set)
                    })
                    .collect();
                Ok(ObjectData::IinBits(bits))
            }
            _ => Err(invalid(variation, qualifier)),
        },
        _ => Err(invalid(variation, qualifier)),
    }
}

fn decode_command(
    variation: Variation,
    cursor: &mut ReadCursor<'_>,
) -> Dnp3Result<(Control, CommandStatus)> {
    let control = match variation {
        Variation::Group12Var1 => {
            let code = ControlCode::from_u8(cursor.read_u8()?);
            let count = cursor.read_u8()?;
            let on_time = cursor.read_u32()?;
            let off_time = cursor.read_u32()?;
            Control::Crob(Crob::new(code, count, on_time, off_time))
        }
        Variation::Group41Var1 => Control::AnalogOutput(AnalogOutput::I32(cursor.read_i32()?)),
        Variation::Group41Var2 => Control::AnalogOutput(AnalogOutput::I16(cursor.read_i16()?)),
        Variation::Group41Var3 => Control::AnalogOutput(AnalogOutput::F32(cursor.read_f32()?)),
        Variation::Group41Var4 => Control::AnalogOutput(AnalogOutput::F64(cursor.read_f64()?)),
        _ => {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "{} is not a control object",
                variation
            )));
        }
    };
    let status = CommandStatus::from_u8(cursor.read_u8()?);
    Ok((control, status))
}

fn parse_free_format(
    cursor: &mut ReadCursor<'_>,
    variation: Variation,
    count: u16,
) -> Dnp3Result<ObjectData> {
    if count != 1 {
        return Err(Dnp3Error::FragmentInvalid(format!(
            "free-format header with {} objects",
            count
        )));
    }
    let size = usize::from(cursor.read_u16()?);
    let object = cursor.read_bytes(size)?;
    let mut inner = ReadCursor::new(object);
    let data = match variation {
        Variation::Group70Var3 => ObjectData::FileCommand(FileCommand::decode(&mut inner)?),
        Variation::Group70Var4 => {
            ObjectData::FileStatus(FileCommandStatus::decode(&mut inner, size)?)
        }
        Variation::Group70Var5 => {
            ObjectData::FileTransport(FileTransport::decode(&mut inner, size)?)
        }
        _ => return Err(invalid(variation, QualifierCode::FreeFormat16)),
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_core::{Flags, Measurement, OpType};

    #[test]
    fn test_parse_class_read() {
        let data = [60, 2, 0x06, 60, 3, 0x06, 60, 4, 0x06, 60, 1, 0x06];
        let headers = parse_object_headers(&data, false).unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers[3].variation, Variation::Group60Var1);
        assert_eq!(headers[3].range, HeaderRange::All);
        assert_eq!(headers[0].data, ObjectData::None);
    }

    #[test]
    fn test_parse_ranged_read_without_data() {
        let data = [30, 0, 0x01, 0x02, 0x00, 0x05, 0x00];
        let headers = parse_object_headers(&data, false).unwrap();
        assert_eq!(headers[0].range, HeaderRange::Range { start: 2, stop: 5 });
        assert_eq!(headers[0].data, ObjectData::None);
    }

    #[test]
    fn test_parse_static_binary_range() {
        let data = [1, 2, 0x00, 0x03, 0x04, 0x81, 0x01];
        let headers = parse_object_headers(&data, true).unwrap();
        match &headers[0].data {
            ObjectData::Measurements(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].0, 3);
                assert_eq!(items[1].0, 4);
                assert_eq!(items[0].1.wire_flags(), 0x81);
                assert_eq!(items[1].1.flags(), Flags::ONLINE);
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn test_parse_prefixed_crob() {
        let data = [
            12, 1, 0x28, 0x01, 0x00, 0x03, 0x00, 0x03, 0x01, 0x64, 0x00, 0x00, 0x00, 0x64, 0x00,
            0x00, 0x00, 0x00,
        ];
        let headers = parse_object_headers(&data, true).unwrap();
        match &headers[0].data {
            ObjectData::Commands(commands) => {
                assert_eq!(commands.len(), 1);
                assert_eq!(commands[0].index, 3);
                assert_eq!(commands[0].status, CommandStatus::Success);
                match commands[0].control {
                    Control::Crob(crob) => {
                        assert_eq!(crob.code.op_type, OpType::LatchOn);
                        assert_eq!(crob.on_time, 100);
                    }
                    other => panic!("unexpected control: {:?}", other),
                }
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn test_parse_restart_bit_write() {
        let data = [80, 1, 0x00, 0x07, 0x07, 0x00];
        let headers = parse_object_headers(&data, true).unwrap();
        assert_eq!(headers[0].data, ObjectData::IinBits(vec![(7, false)]));
    }

    #[test]
    fn test_parse_fine_delay() {
        let data = [52, 2, 0x07, 0x01, 0xF4, 0x01];
        let headers = parse_object_headers(&data, true).unwrap();
        assert_eq!(headers[0].data, ObjectData::Delay(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_object_headers(&[99, 1, 0x06], false),
            Err(Dnp3Error::UnknownObject {
                group: 99,
                variation: 1
            })
        );
        assert_eq!(
            parse_object_headers(&[60, 1, 0x33], false),
            Err(Dnp3Error::UnsupportedQualifier(0x33))
        );
        assert!(matches!(
            parse_object_headers(&[30, 1, 0x00, 0x05, 0x02], false),
            Err(Dnp3Error::FragmentInvalid(_))
        ));
        assert!(matches!(
            parse_object_headers(&[30, 1, 0x00, 0x00, 0x01, 0x01], true),
            Err(Dnp3Error::FragmentInvalid(_))
        ));
    }

    #[test]
    fn test_parse_event_prefixed_analog() {
        let data = [32, 1, 0x28, 0x01, 0x00, 0x07, 0x00, 0x01, 0x0A, 0x00, 0x00, 0x00];
        let headers = parse_object_headers(&data, true).unwrap();
        match &headers[0].data {
            ObjectData::Measurements(items) => {
                assert_eq!(items[0].0, 7);
                let expected = dnp3_core::AnalogInput::new(10.0, Flags::ONLINE, None);
                assert_eq!(items[0].1, Measurement::AnalogInput(expected));
            }
            other => panic!("unexpected data: {:?}", other),
        }
    }
}
