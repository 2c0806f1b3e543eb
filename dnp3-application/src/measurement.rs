//! Encoding and decoding of measurement objects

use crate::cursor::ReadCursor;
use crate::variation::{Layout, ValueKind, Variation};
use bytes::{BufMut, BytesMut};
use dnp3_core::{
    AnalogInput, AnalogOutputStatus, BinaryInput, BinaryOutputStatus, Counter, Dnp3Error,
    Dnp3Result, DoubleBitBinaryInput, Flags, FrozenCounter, Measurement, PointType, Time,
};

/// Value converted for the wire
enum WireValue {
    None,
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

fn layout_of(variation: Variation) -> Dnp3Result<Layout> {
    variation
        .layout()
        .ok_or_else(|| {
            Dnp3Error::InvalidData(format!("{} is not a measurement variation", variation))
        })
}

fn to_i32(value: f64) -> (i32, bool) {
    if value.is_nan() {
        return (0, true);
    }
    let rounded = value.round();
    if rounded > f64::from(i32::MAX) {
        (i32::MAX, true)
    } else if rounded < f64::from(i32::MIN) {
        (i32::MIN, true)
    } else {
        (rounded as i32, false)
    }
}

fn to_f32(value: f64) -> (f32, bool) {
    if value.is_finite() && value > f64::from(f32::MAX) {
        (f32::MAX, true)
    } else if value.is_finite() && value < f64::from(f32::MIN) {
        (f32::MIN, true)
    } else {
        (value as f32, false)
    }
}

fn counter_value(measurement: &Measurement) -> u32 {
    match measurement {
        Measurement::Counter(x) => x.value,
        Measurement::FrozenCounter(x) => x.value,
        _ => 0,
    }
}

/// Encode one measurement in the given variation
///
/// Values that do not fit an integer or single-precision variation are clamped and
/// reported with the OVER_RANGE flag.
///
/// # Errors
///
/// Returns `Dnp3Error::InvalidData` if the variation is not a measurement variation
/// or describes a different point type.
pub fn encode_measurement(
    variation: Variation,
    measurement: &Measurement,
    buffer: &mut BytesMut,
) -> Dnp3Result<()> {
    let layout = layout_of(variation)?;
    if layout.point_type != measurement.point_type() {
        return Err(Dnp3Error::InvalidData(format!(
            "cannot encode {} as {}",
            measurement.point_type(),
            variation
        )));
    }

    let numeric = measurement.numeric_value().unwrap_or_default();
    let (value, over_range) = match layout.value {
        ValueKind::State => (WireValue::None, false),
        ValueKind::U32 => (WireValue::U32(counter_value(measurement)), false),
        ValueKind::I32 => {
            let (x, clamped) = to_i32(numeric);
            (WireValue::I32(x), clamped)
        }
        ValueKind::F32 => {
            let (x, clamped) = to_f32(numeric);
            (WireValue::F32(x), clamped)
        }
        ValueKind::F64 => (WireValue::F64(numeric), false),
    };

    if layout.flags {
        let mut flags = measurement.wire_flags();
        if over_range {
            flags |= Flags::OVER_RANGE.value;
        }
        buffer.put_u8(flags);
    }

    match value {
        WireValue::None => {}
        WireValue::U32(x) => buffer.put_u32_le(x),
        WireValue::I32(x) => buffer.put_i32_le(x),
        WireValue::F32(x) => buffer.put_f32_le(x),
        WireValue::F64(x) => buffer.put_f64_le(x),
    }

    if layout.time {
        let timestamp = measurement.time().map(|t| t.timestamp()).unwrap_or_default();
        buffer.put_slice(&timestamp.to_le_bytes());
    }

    Ok(())
}

/// Decode one measurement of the given variation
///
/// Variations without a flags byte decode as ONLINE. Timestamps decode as synchronized
/// since the wire format does not carry the distinction.
pub fn decode_measurement(
    variation: Variation,
    cursor: &mut ReadCursor<'_>,
) -> Dnp3Result<Measurement> {
    let layout = layout_of(variation)?;

    let flags = if layout.flags {
        cursor.read_u8()?
    } else {
        Flags::ONLINE.value
    };

    let numeric = match layout.value {
        ValueKind::State => 0.0,
        ValueKind::U32 => f64::from(cursor.read_u32()?),
        ValueKind::I32 => f64::from(cursor.read_i32()?),
        ValueKind::F32 => f64::from(cursor.read_f32()?),
        ValueKind::F64 => cursor.read_f64()?,
    };

    let time = if layout.time {
        Some(Time::Synchronized(cursor.read_timestamp()?))
    } else {
        None
    };

    let measurement: Measurement = match layout.point_type {
        PointType::BinaryInput => BinaryInput::from_wire(flags, time).into(),
        PointType::DoubleBitBinaryInput => DoubleBitBinaryInput::from_wire(flags, time).into(),
        PointType::BinaryOutputStatus => BinaryOutputStatus::from_wire(flags, time).into(),
        PointType::Counter => Counter::new(numeric as u32, Flags::new(flags), time).into(),
        PointType::FrozenCounter => {
            FrozenCounter::new(numeric as u32, Flags::new(flags), time).into()
        }
        PointType::AnalogInput => AnalogInput::new(numeric, Flags::new(flags), time).into(),
        PointType::AnalogOutputStatus => {
            AnalogOutputStatus::new(numeric, Flags::new(flags), time).into()
        }
    };
    Ok(measurement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_binary_with_time() {
        let time = Some(Time::synchronized(1));
        let m = Measurement::from(BinaryInput::new(true, Flags::ONLINE, time));
        let mut buffer = BytesMut::new();
        encode_measurement(Variation::Group2Var2, &m, &mut buffer).unwrap();
        assert_eq!(&buffer[..], &[0x81, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_analog_i32_over_range() {
        let m = Measurement::from(AnalogInput::new(1e12, Flags::ONLINE, None));
        let mut buffer = BytesMut::new();
        encode_measurement(Variation::Group30Var1, &m, &mut buffer).unwrap();
        assert_eq!(buffer[0], 0x21);
        assert_eq!(&buffer[1..], &i32::MAX.to_le_bytes());
    }

    #[test]
    fn test_encode_rejects_wrong_type() {
        let m = Measurement::from(Counter::new(1, Flags::ONLINE, None));
        let mut buffer = BytesMut::new();
        assert!(encode_measurement(Variation::Group30Var1, &m, &mut buffer).is_err());
        assert!(encode_measurement(Variation::Group12Var1, &m, &mut buffer).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_counter_without_flags() {
        let data = [0x2A, 0x00, 0x00, 0x00];
        let mut cursor = ReadCursor::new(&data);
        let m = decode_measurement(Variation::Group20Var5, &mut cursor).unwrap();
        assert_eq!(m, Measurement::from(Counter::new(42, Flags::ONLINE, None)));
    }

    #[test]
    fn test_decode_analog_float_event() {
        let mut buffer = BytesMut::new();
        let original = Measurement::from(AnalogInput::new(
            -2.5,
            Flags::ONLINE,
            Some(Time::synchronized(1_000)),
        ));
        encode_measurement(Variation::Group32Var7, &original, &mut buffer).unwrap();
        let mut cursor = ReadCursor::new(&buffer);
        assert_eq!(decode_measurement(Variation::Group32Var7, &mut cursor).unwrap(), original);
        assert!(cursor.is_empty());
    }
}
