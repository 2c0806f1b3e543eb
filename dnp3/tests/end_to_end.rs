//! A master and an outstation wired together through in-memory sinks

use dnp3::app::{
    Control, FragmentWriter, FunctionCode, HeaderRange, ObjectData, Request, RequestHeader,
    Response, Sequence, Variation,
};
use dnp3::master::{
    AssociationConfig, AssociationHandle, CommandHeaders, CommandMode, HeaderInfo, MasterChannel,
    MasterConfig, NullHandler, ReadHandler, ReadRequest, ReadType,
};
use dnp3::outstation::{
    AcceptAllControls, Database, DatabaseError, EventBufferConfig, Features, NullApplication,
    Outstation, OutstationConfig, PointConfig, UpdateMode,
};
use dnp3::transport::{Fragment, LinkState, MemorySink};
use dnp3::{
    AnalogInput, BinaryOutputStatus, Classes, CommandStatus, Crob, EndpointAddress, Flags, Iin,
    Measurement, OpType, PointType, Time,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

const MASTER: EndpointAddress = EndpointAddress::raw(1);
const OUTSTATION: EndpointAddress = EndpointAddress::raw(1024);

type Received = Arc<Mutex<Vec<(ReadType, u16, Measurement)>>>;

/// Every fragment exchanged, in the order it crossed the wire
type Wire = Arc<Mutex<Vec<Fragment>>>;

struct Recorder {
    read_type: ReadType,
    received: Received,
}

impl ReadHandler for Recorder {
    fn begin_fragment(&mut self, read_type: ReadType, _iin: Iin) {
        self.read_type = read_type;
    }

    fn handle_measurements(&mut self, _info: HeaderInfo, measurements: &[(u16, Measurement)]) {
        let mut received = self.received.lock();
        for (index, value) in measurements {
            received.push((self.read_type, *index, *value));
        }
    }
}

struct Pair {
    channel: Arc<MasterChannel>,
    association: AssociationHandle,
    outstation: Outstation,
    wire: Wire,
    received: Received,
}

fn outstation_config() -> OutstationConfig {
    OutstationConfig {
        features: Features {
            broadcast: true,
            unsolicited: false,
        },
        ..OutstationConfig::new(OUTSTATION, MASTER)
    }
}

fn points(db: &mut Database) -> Result<(), DatabaseError> {
    for index in 0..4 {
        db.add(PointType::BinaryOutputStatus, index, PointConfig::default())?;
    }
    for index in 0..8 {
        db.add(PointType::AnalogInput, index, PointConfig::default().with_deadband(0.0))?;
    }
    Ok(())
}

impl Pair {
    /// Spawn both sides; the master association is enabled but the link is not reported up
    async fn new(
        outstation_config: OutstationConfig,
        association_config: AssociationConfig,
    ) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let wire = Wire::default();

        let (outstation_sink, mut responses) = MemorySink::new();
        let outstation = Outstation::spawn(
            outstation_config,
            Arc::new(outstation_sink),
            Box::new(NullApplication),
            Box::new(AcceptAllControls),
            Box::new(NullApplication),
        );
        outstation.transaction(points).unwrap();

        let (master_sink, mut requests) = MemorySink::new();
        let channel = Arc::new(MasterChannel::new(
            MasterConfig::new(MASTER),
            Arc::new(master_sink),
        ));
        let received = Received::default();
        let association = channel
            .add_association(
                OUTSTATION,
                association_config,
                Box::new(Recorder {
                    read_type: ReadType::SinglePoll,
                    received: received.clone(),
                }),
                Box::new(NullHandler),
                Box::new(NullHandler),
            )
            .await
            .unwrap();
        association.enable().unwrap();

        let to_outstation = outstation.clone();
        let tap = wire.clone();
        tokio::spawn(async move {
            while let Some(fragment) = requests.recv().await {
                tap.lock().push(fragment.clone());
                if to_outstation.on_fragment_received(fragment).is_err() {
                    break;
                }
            }
        });

        let to_master = channel.clone();
        let tap = wire.clone();
        tokio::spawn(async move {
            while let Some(fragment) = responses.recv().await {
                tap.lock().push(fragment.clone());
                to_master.on_fragment_received(fragment).await;
            }
        });

        Self {
            channel,
            association,
            outstation,
            wire,
            received,
        }
    }

    async fn connected(
        outstation_config: OutstationConfig,
        association_config: AssociationConfig,
    ) -> Self {
        let pair = Self::new(outstation_config, association_config).await;
        pair.channel.on_link_state_changed(LinkState::Up).await;
        pair
    }

    /// Wait until the startup tasks are done by running a read queued behind them
    async fn settle(&self) {
        assert_ok!(
            self.association
                .read(ReadRequest::range(Variation::Group30Var0, 0, 0))
                .await
        );
        self.received.lock().clear();
    }

    fn update_analog(&self, index: u16, value: f64, time: u64) {
        self.outstation
            .database()
            .update(
                index,
                AnalogInput::new(value, Flags::ONLINE, Some(Time::synchronized(time))),
                UpdateMode::Detect,
            )
            .unwrap();
    }

    fn values(&self, read_type: ReadType) -> Vec<(u16, Option<f64>)> {
        self.received
            .lock()
            .iter()
            .filter(|(kind, _, _)| *kind == read_type)
            .map(|(_, index, value)| (*index, value.numeric_value()))
            .collect()
    }

    /// Requests sent by the master, confirms excluded
    fn requests(&self) -> Vec<Fragment> {
        self.wire
            .lock()
            .iter()
            .filter(|f| f.source == MASTER)
            .filter(|f| {
                Request::parse(&f.data).is_ok_and(|r| r.header.function != FunctionCode::Confirm)
            })
            .cloned()
            .collect()
    }

    fn output_state(&self, index: u16) -> Option<Measurement> {
        self.outstation
            .transaction(|db| {
                let point = db.get(PointType::BinaryOutputStatus, index);
                Ok::<_, DatabaseError>(point.map(|p| p.value))
            })
            .unwrap()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition not reached");
}

fn is_integrity(fragment: &Fragment) -> bool {
    Request::parse(&fragment.data)
        .and_then(|r| r.object_headers())
        .is_ok_and(|headers| headers.iter().any(|h| h.variation == Variation::Group60Var1))
}

/// Start index of a ranged READ
fn range_start(fragment: &Fragment) -> Option<u16> {
    let request = Request::parse(&fragment.data).ok()?;
    if request.header.function != FunctionCode::Read {
        return None;
    }
    let headers = request.object_headers().ok()?;
    match headers.first()?.range {
        HeaderRange::Range { start, .. } => Some(start),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn deadband_zero_reports_changes_only() {
    let pair = Pair::connected(outstation_config(), AssociationConfig::quiet()).await;
    pair.settle().await;

    pair.update_analog(7, 10.0, 0);
    pair.update_analog(7, 10.0, 1);
    assert_ok!(pair.association.read(ReadRequest::class_scan(Classes::class123())).await);
    assert_eq!(pair.values(ReadType::SinglePoll), vec![(7, Some(10.0))]);

    pair.update_analog(7, 11.0, 2);
    assert_ok!(pair.association.read(ReadRequest::class_scan(Classes::class123())).await);
    assert_eq!(
        pair.values(ReadType::SinglePoll),
        vec![(7, Some(10.0)), (7, Some(11.0))]
    );
}

#[tokio::test(start_paused = true)]
async fn select_before_operate_drives_output() {
    let pair = Pair::connected(outstation_config(), AssociationConfig::quiet()).await;
    pair.settle().await;

    let headers = CommandHeaders::new().add(3, Crob::from_op_type(OpType::LatchOn));
    assert_ok!(
        pair.association
            .operate(CommandMode::SelectBeforeOperate, headers)
            .await
    );
    let expected: Measurement = BinaryOutputStatus::new(true, Flags::ONLINE, None).into();
    assert_eq!(pair.output_state(3), Some(expected));

    // an OPERATE that was never selected is refused and leaves the point alone
    let mut writer = FragmentWriter::request(
        RequestHeader::new(Control::request(Sequence::new(12)), FunctionCode::Operate),
        2048,
    );
    let latch_off = dnp3::app::CommandObject::new(3, Crob::from_op_type(OpType::LatchOff));
    writer.write_commands(&[latch_off]).unwrap();
    pair.outstation
        .on_fragment_received(Fragment::new(MASTER, OUTSTATION, writer.finish()))
        .unwrap();

    let wire = pair.wire.clone();
    let reply = move || {
        wire.lock().iter().rev().find_map(|f| {
            let response = Response::parse(&f.data).ok()?;
            (f.source == OUTSTATION && response.header.control.seq == Sequence::new(12))
                .then(|| response.object_headers().ok())
                .flatten()
        })
    };
    wait_until(|| reply().is_some()).await;
    let statuses: Vec<CommandStatus> = reply()
        .unwrap_or_default()
        .iter()
        .flat_map(|h| match &h.data {
            ObjectData::Commands(items) => items.iter().map(|c| c.status).collect(),
            _ => Vec::new(),
        })
        .collect();
    assert_eq!(statuses, vec![CommandStatus::NoSelect]);
    assert_eq!(pair.output_state(3), Some(expected));
}

#[tokio::test(start_paused = true)]
async fn reads_queued_while_disconnected_follow_integrity() {
    let pair = Pair::new(outstation_config(), AssociationConfig::quiet()).await;
    pair.channel.on_link_state_changed(LinkState::Down).await;

    let association = pair.association.clone();
    let channel = pair.channel.clone();
    let (first, second, third, ()) = tokio::join!(
        association.read(ReadRequest::range(Variation::Group30Var0, 1, 1)),
        association.read(ReadRequest::range(Variation::Group30Var0, 2, 2)),
        association.read(ReadRequest::range(Variation::Group30Var0, 3, 3)),
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            channel.on_link_state_changed(LinkState::Up).await;
        },
    );
    assert_ok!(first);
    assert_ok!(second);
    assert_ok!(third);

    let requests = pair.requests();
    let integrity = requests.iter().position(is_integrity).unwrap();
    let reads: Vec<(usize, u16)> = requests
        .iter()
        .enumerate()
        .filter(|(_, f)| !is_integrity(f))
        .filter_map(|(position, f)| range_start(f).map(|start| (position, start)))
        .collect();
    assert_eq!(reads.iter().map(|(_, start)| *start).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(reads.iter().all(|(position, _)| *position > integrity));
}

#[tokio::test(start_paused = true)]
async fn commands_fail_while_disconnected() {
    let pair = Pair::new(outstation_config(), AssociationConfig::quiet()).await;
    pair.channel.on_link_state_changed(LinkState::Down).await;
    let headers = CommandHeaders::new().add(0, Crob::from_op_type(OpType::LatchOn));
    let result = pair.association.operate(CommandMode::DirectOperate, headers).await;
    assert_eq!(result, Err(dnp3::master::TaskError::NoConnection));
}

#[tokio::test(start_paused = true)]
async fn overflow_keeps_newest_and_triggers_integrity() {
    let config = OutstationConfig {
        event_buffer: EventBufferConfig::all_types(3),
        ..outstation_config()
    };
    let pair = Pair::connected(config, AssociationConfig::quiet()).await;
    pair.settle().await;
    let integrity_polls = pair.requests().iter().filter(|f| is_integrity(f)).count();

    for value in 1..=5 {
        pair.update_analog(0, f64::from(value), 0);
    }
    assert_ok!(pair.association.read(ReadRequest::class_scan(Classes::class123())).await);
    assert_eq!(
        pair.values(ReadType::SinglePoll),
        vec![(0, Some(3.0)), (0, Some(4.0)), (0, Some(5.0))]
    );

    // the overflow indication makes the master run another integrity poll
    wait_until(|| {
        let polls = pair.requests().iter().filter(|f| is_integrity(f)).count();
        polls > integrity_polls
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn one_request_in_flight() {
    let pair = Pair::connected(outstation_config(), AssociationConfig::quiet()).await;
    pair.settle().await;

    let association = pair.association.clone();
    let (a, b, c) = tokio::join!(
        association.read(ReadRequest::class_scan(Classes::class0())),
        association.read(ReadRequest::range(Variation::Group10Var0, 0, 3)),
        association.read(ReadRequest::class_scan(Classes::class123())),
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_ok!(c);

    // solicited traffic strictly alternates request, response with matching sequence
    let exchanges: Vec<(bool, Sequence)> = pair
        .wire
        .lock()
        .iter()
        .filter_map(|f| {
            if f.source == MASTER {
                let request = Request::parse(&f.data).ok()?;
                (request.header.function != FunctionCode::Confirm)
                    .then_some((true, request.header.control.seq))
            } else {
                let response = Response::parse(&f.data).ok()?;
                (!response.header.is_unsolicited()).then_some((false, response.header.control.seq))
            }
        })
        .collect();
    assert!(!exchanges.is_empty());
    for exchange in exchanges.chunks(2) {
        assert_eq!(exchange.len(), 2);
        assert!(exchange[0].0 && !exchange[1].0);
        assert_eq!(exchange[0].1, exchange[1].1);
    }
}

#[tokio::test(start_paused = true)]
async fn unsolicited_events_reach_master() {
    let config = OutstationConfig {
        features: Features::default(),
        ..outstation_config()
    };
    let pair = Pair::connected(config, AssociationConfig::default()).await;
    pair.settle().await;

    pair.update_analog(5, 42.0, 0);
    wait_until(|| pair.values(ReadType::Unsolicited).contains(&(5, Some(42.0)))).await;
}
