use bytes::Bytes;
use ratelink::{
    Clock, ControlSnapshot, InfiniteQueue, LinkDriver, LinkOptions, LinkQueue, SharedControl,
    TokioClock,
};
use tokio::sync::mpsc;


pub(crate) const MBIT: u64 = 1_000_000;

pub(crate) struct Harness {
    pub(crate) control: SharedControl,
    pub(crate) clock: TokioClock,
    pub(crate) input: mpsc::Sender<Bytes>,
    pub(crate) output: mpsc::Receiver<Bytes>,
    pub(crate) driver: LinkDriver<SharedControl, InfiniteQueue>,
}

/// A driver over a shared control at `rate_bps`, created at the current tokio time.
pub(crate) fn harness(rate_bps: u64, options: LinkOptions) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();

    let control = SharedControl::new(ControlSnapshot::new(rate_bps, true));
    let clock = TokioClock::new();
    let link = LinkQueue::new(control.clone(), InfiniteQueue::new(), options, clock.now()).unwrap();

    let (input, from_peer) = mpsc::channel(1024);
    let (to_peer, output) = mpsc::channel(1024);
    let driver = LinkDriver::new(link, clock, from_peer, to_peer);

    Harness { control, clock, input, output, driver }
}
