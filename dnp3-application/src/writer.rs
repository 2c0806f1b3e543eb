//! Fragment writer
//!
//! Builds a request or response fragment header by header. Each `write_*` call either
//! appends a complete object header or leaves the fragment untouched and returns
//! `Dnp3Error::WriteOverflow`, so callers can pack as much as fits and continue in
//! the next fragment.

use crate::file::{FileCommand, FileCommandStatus, FileTransport};
use crate::header::{Control, RequestHeader, ResponseHeader};
use crate::measurement::encode_measurement;
use crate::objects::{CommandObject, QualifierCode};
use crate::variation::Variation;
use bytes::{BufMut, Bytes, BytesMut};
use dnp3_core::{
    AnalogOutput, Classes, Control as ControlObject, Dnp3Error, Dnp3Result, Iin, Measurement,
    Timestamp,
};

/// Writer for a single application fragment
#[derive(Debug, Clone)]
pub struct FragmentWriter {
    buffer: BytesMut,
    header_len: usize,
    max_size: usize,
}

impl FragmentWriter {
    /// Start a request fragment
    #[must_use]
    pub fn request(header: RequestHeader, max_size: usize) -> Self {
        let mut buffer = BytesMut::with_capacity(max_size);
        buffer.put_slice(&header.to_bytes());
        Self {
            buffer,
            header_len: RequestHeader::LENGTH,
            max_size,
        }
    }

    /// Start a response fragment
    #[must_use]
    pub fn response(header: ResponseHeader, max_size: usize) -> Self {
        let mut buffer = BytesMut::with_capacity(max_size);
        buffer.put_slice(&header.to_bytes());
        Self {
            buffer,
            header_len: ResponseHeader::LENGTH,
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes still available for object headers
    pub fn remaining(&self) -> usize {
        self.max_size.saturating_sub(self.buffer.len())
    }

    /// True once at least one object header has been written
    pub fn has_objects(&self) -> bool {
        self.buffer.len() > self.header_len
    }

    /// Overwrite the control field
    pub fn set_control(&mut self, control: Control) {
        self.buffer[0] = control.to_u8();
    }

    /// Overwrite the IIN of a response fragment
    pub fn set_iin(&mut self, iin: Iin) {
        if self.header_len == ResponseHeader::LENGTH {
            let bytes = iin.to_bytes();
            self.buffer[2] = bytes[0];
            self.buffer[3] = bytes[1];
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Finish the fragment
    pub fn finish(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Number of measurements of `variation` that fit in one more header
    ///
    /// # Arguments
    ///
    /// * `variation` - Measurement variation to be written
    /// * `prefixed` - Whether each object carries a 16-bit index (events)
    pub fn measurement_capacity(&self, variation: Variation, prefixed: bool) -> usize {
        let Some(layout) = variation.layout() else {
            return 0;
        };
        // object header plus 16-bit start/stop or 16-bit count
        let overhead = 3 + if prefixed { 2 } else { 4 };
        let per_object = layout.size() + if prefixed { 2 } else { 0 };
        self.remaining().saturating_sub(overhead) / per_object
    }

    fn append(&mut self, header: BytesMut) -> Dnp3Result<()> {
        if header.len() > self.remaining() {
            return Err(Dnp3Error::WriteOverflow {
                needed: header.len(),
                remaining: self.remaining(),
            });
        }
        self.buffer.put_slice(&header);
        Ok(())
    }

    fn start_header(variation: Variation, qualifier: QualifierCode) -> BytesMut {
        let (group, var) = variation.group_var();
        let mut header = BytesMut::new();
        header.put_u8(group);
        header.put_u8(var);
        header.put_u8(qualifier.as_u8());
        header
    }

    fn put_range(header: &mut BytesMut, start: u16, stop: u16) -> QualifierCode {
        if stop <= 0xFF {
            header.put_u8(start as u8);
            header.put_u8(stop as u8);
            QualifierCode::Range8
        } else {
            header.put_u16_le(start);
            header.put_u16_le(stop);
            QualifierCode::Range16
        }
    }

    /// Write a header with qualifier 0x06 (all objects)
    pub fn write_all_objects(&mut self, variation: Variation) -> Dnp3Result<()> {
        let header = Self::start_header(variation, QualifierCode::AllObjects);
        self.append(header)
    }

    /// Write class data headers: events classes 1, 2, 3 first, then class 0
    pub fn write_class_read(&mut self, classes: Classes) -> Dnp3Result<()> {
        let mut headers = BytesMut::new();
        for (selected, variation) in [
            (classes.events.class1, Variation::Group60Var2),
            (classes.events.class2, Variation::Group60Var3),
            (classes.events.class3, Variation::Group60Var4),
            (classes.class0, Variation::Group60Var1),
        ] {
            if selected {
                headers.put_slice(&Self::start_header(variation, QualifierCode::AllObjects));
            }
        }
        self.append(headers)
    }

    /// Write a start/stop header without object data (READ requests)
    pub fn write_range(&mut self, variation: Variation, start: u16, stop: u16) -> Dnp3Result<()> {
        let mut range = BytesMut::new();
        let qualifier = Self::put_range(&mut range, start, stop);
        let mut header = Self::start_header(variation, qualifier);
        header.put_slice(&range);
        self.append(header)
    }

    /// Write contiguous measurements starting at index `start`
    pub fn write_measurement_range(
        &mut self,
        variation: Variation,
        start: u16,
        values: &[Measurement],
    ) -> Dnp3Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let count = u16::try_from(values.len() - 1)
            .ok()
            .and_then(|x| start.checked_add(x))
            .ok_or_else(|| Dnp3Error::InvalidData("range exceeds 65535".to_string()))?;
        let mut header = Self::start_header(variation, QualifierCode::Range16);
        header.put_u16_le(start);
        header.put_u16_le(count);
        for value in values {
            encode_measurement(variation, value, &mut header)?;
        }
        self.append(header)
    }

    /// Write measurements each prefixed by a 16-bit index (qualifier 0x28)
    pub fn write_measurements_prefixed(
        &mut self,
        variation: Variation,
        values: &[(u16, Measurement)],
    ) -> Dnp3Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let count = u16::try_from(values.len())
            .map_err(|_| Dnp3Error::InvalidData("too many objects".to_string()))?;
        let mut header = Self::start_header(variation, QualifierCode::CountAndPrefix16);
        header.put_u16_le(count);
        for (index, value) in values {
            header.put_u16_le(*index);
            encode_measurement(variation, value, &mut header)?;
        }
        self.append(header)
    }

    /// Write control objects of a single variation, each prefixed by a 16-bit index
    pub fn write_commands(&mut self, commands: &[CommandObject]) -> Dnp3Result<()> {
        let Some(first) = commands.first() else {
            return Ok(());
        };
        let variation = first.variation();
        if commands.iter().any(|c| c.variation() != variation) {
            return Err(Dnp3Error::InvalidData(
                "control objects in one header must share a variation".to_string(),
            ));
        }
        let count = u16::try_from(commands.len())
            .map_err(|_| Dnp3Error::InvalidData("too many objects".to_string()))?;
        let mut header = Self::start_header(variation, QualifierCode::CountAndPrefix16);
        header.put_u16_le(count);
        for command in commands {
            header.put_u16_le(command.index);
            match command.control {
                ControlObject::Crob(crob) => {
                    header.put_u8(crob.code.as_u8());
                    header.put_u8(crob.count);
                    header.put_u32_le(crob.on_time);
                    header.put_u32_le(crob.off_time);
                }
                ControlObject::AnalogOutput(AnalogOutput::I32(x)) => header.put_i32_le(x),
                ControlObject::AnalogOutput(AnalogOutput::I16(x)) => header.put_i16_le(x),
                ControlObject::AnalogOutput(AnalogOutput::F32(x)) => header.put_f32_le(x),
                ControlObject::AnalogOutput(AnalogOutput::F64(x)) => header.put_f64_le(x),
            }
            header.put_u8(command.status.as_u8());
        }
        self.append(header)
    }

    /// Write a single time object (g50v1 or g50v3) with a count of one
    pub fn write_time(&mut self, variation: Variation, time: Timestamp) -> Dnp3Result<()> {
        let mut header = Self::start_header(variation, QualifierCode::Count8);
        header.put_u8(1);
        header.put_slice(&time.to_le_bytes());
        self.append(header)
    }

    /// Write a single time delay object (g52v1 seconds or g52v2 milliseconds)
    pub fn write_delay(&mut self, variation: Variation, value: u16) -> Dnp3Result<()> {
        let mut header = Self::start_header(variation, QualifierCode::Count8);
        header.put_u8(1);
        header.put_u16_le(value);
        self.append(header)
    }

    /// Write a single internal indication bit (g80v1)
    pub fn write_iin_bit(&mut self, index: u8, value: bool) -> Dnp3Result<()> {
        let mut header = Self::start_header(Variation::Group80Var1, QualifierCode::Range8);
        header.put_u8(index);
        header.put_u8(index);
        header.put_u8(u8::from(value));
        self.append(header)
    }

    fn write_free_format(
        &mut self,
        variation: Variation,
        encode: impl FnOnce(&mut BytesMut) -> Dnp3Result<()>,
    ) -> Dnp3Result<()> {
        let mut object = BytesMut::new();
        encode(&mut object)?;
        let size = u16::try_from(object.len())
            .map_err(|_| Dnp3Error::InvalidData("free-format object too large".to_string()))?;
        let mut header = Self::start_header(variation, QualifierCode::FreeFormat16);
        header.put_u8(1);
        header.put_u16_le(size);
        header.put_slice(&object);
        self.append(header)
    }

    pub fn write_file_command(&mut self, command: &FileCommand) -> Dnp3Result<()> {
        self.write_free_format(Variation::Group70Var3, |b| command.encode(b))
    }

    pub fn write_file_status(&mut self, status: &FileCommandStatus) -> Dnp3Result<()> {
        self.write_free_format(Variation::Group70Var4, |b| status.encode(b))
    }

    pub fn write_file_transport(&mut self, transport: &FileTransport) -> Dnp3Result<()> {
        self.write_free_format(Variation::Group70Var5, |b| transport.encode(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionCode;
    use crate::header::{Request, Response};
    use crate::objects::{HeaderRange, ObjectData};
    use crate::sequence::Sequence;
    use dnp3_core::{AnalogInput, Crob, EventClasses, Flags, OpType, Time};

    fn request(function: FunctionCode) -> FragmentWriter {
        FragmentWriter::request(
            RequestHeader::new(Control::request(Sequence::new(1)), function),
            2048,
        )
    }

    #[test]
    fn test_integrity_request_bytes() {
        let mut writer = request(FunctionCode::Read);
        writer.write_class_read(Classes::all()).unwrap();
        assert_eq!(
            writer.as_bytes(),
            &[0xC1, 0x01, 60, 2, 0x06, 60, 3, 0x06, 60, 4, 0x06, 60, 1, 0x06]
        );
    }

    #[test]
    fn test_event_only_class_read() {
        let mut writer = request(FunctionCode::Read);
        writer
            .write_class_read(Classes::new(false, EventClasses::new(false, true, false)))
            .unwrap();
        assert_eq!(&writer.as_bytes()[2..], &[60, 3, 0x06]);
    }

    #[test]
    fn test_range_picks_qualifier() {
        let mut writer = request(FunctionCode::Read);
        writer.write_range(Variation::Group1Var0, 1, 10).unwrap();
        writer.write_range(Variation::Group1Var0, 1, 300).unwrap();
        assert_eq!(
            &writer.as_bytes()[2..],
            &[1, 0, 0x00, 1, 10, 1, 0, 0x01, 1, 0, 0x2C, 0x01]
        );
    }

    #[test]
    fn test_commands_round_trip_through_parser() {
        let mut writer = request(FunctionCode::Select);
        let commands = [CommandObject::new(3, Crob::from_op_type(OpType::LatchOn))];
        writer.write_commands(&commands).unwrap();
        let bytes = writer.finish();
        let parsed = Request::parse(&bytes).unwrap();
        let headers = parsed.object_headers().unwrap();
        assert_eq!(headers[0].data, ObjectData::Commands(commands.to_vec()));
    }

    #[test]
    fn test_mixed_command_variations_rejected() {
        let mut writer = request(FunctionCode::Operate);
        let commands = [
            CommandObject::new(1, Crob::from_op_type(OpType::LatchOn)),
            CommandObject::new(2, AnalogOutput::F32(1.0)),
        ];
        assert!(writer.write_commands(&commands).is_err());
        assert!(!writer.has_objects());
    }

    #[test]
    fn test_overflow_leaves_fragment_untouched() {
        let header = ResponseHeader::new(
            Control::response(Sequence::new(0), true, true, false),
            FunctionCode::Response,
            Iin::default(),
        );
        let mut writer = FragmentWriter::response(header, 12);
        let values = vec![Measurement::from(AnalogInput::new(1.0, Flags::ONLINE, None)); 2];
        assert_eq!(writer.measurement_capacity(Variation::Group30Var1, false), 1);
        assert!(matches!(
            writer.write_measurement_range(Variation::Group30Var1, 0, &values),
            Err(Dnp3Error::WriteOverflow { .. })
        ));
        assert_eq!(writer.len(), 4);
        writer
            .write_measurement_range(Variation::Group30Var1, 0, &values[..1])
            .unwrap();
        assert_eq!(writer.len(), 12);
    }

    #[test]
    fn test_prefixed_events_parse_back() {
        let header = ResponseHeader::new(
            Control::response(Sequence::new(2), true, true, true),
            FunctionCode::Response,
            Iin::default(),
        );
        let mut writer = FragmentWriter::response(header, 2048);
        let time = Some(Time::synchronized(5));
        let event = Measurement::from(AnalogInput::new(11.0, Flags::ONLINE, time));
        writer
            .write_measurements_prefixed(Variation::Group32Var3, &[(7, event)])
            .unwrap();
        let bytes = writer.finish();
        let response = Response::parse(&bytes).unwrap();
        assert!(response.header.control.con);
        let headers = response.object_headers().unwrap();
        assert_eq!(headers[0].range, HeaderRange::Count(1));
        assert_eq!(headers[0].data, ObjectData::Measurements(vec![(7, event)]));
    }

    #[test]
    fn test_set_iin_patches_header() {
        let header = ResponseHeader::new(
            Control::response(Sequence::new(0), true, true, false),
            FunctionCode::Response,
            Iin::default(),
        );
        let mut writer = FragmentWriter::response(header, 2048);
        writer.set_iin(Iin::new(dnp3_core::Iin1::DEVICE_RESTART, dnp3_core::Iin2::default()));
        writer.set_control(Control::response(Sequence::new(3), true, false, true));
        assert_eq!(writer.as_bytes(), &[0xA3, 0x81, 0x80, 0x00]);
    }
}
