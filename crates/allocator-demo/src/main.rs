use std::process;

use allocator::heap::{DEFAULT_HEAP_CAPACITY, DefaultHeap};
use argh::FromArgs;
use snafu::ResultExt as _;
use snafu_utils::{GenericError, Report};

use self::{log::LogLevel, scenario::Scenario};

#[macro_use]
mod log;
mod scenario;

/// Run a workload against a fixed-arena allocator and dump its chunk lists.
#[derive(Debug, FromArgs)]
struct Args {
    /// arena size in bytes
    #[argh(option, default = "DEFAULT_HEAP_CAPACITY")]
    capacity: usize,
    /// workload to run: original, fragmentation or coalesce
    #[argh(option, default = "Scenario::Original")]
    scenario: Scenario,
    /// log every allocator call
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() {
    let args: Args = argh::from_env();
    log::init(if args.verbose {
        LogLevel::Trace
    } else {
        LogLevel::Info
    });

    if let Err(err) = run(&args) {
        let report = Report::new(err);
        eprintln!("{report}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GenericError> {
    let mut arena = vec![0_u8; args.capacity];
    let mut heap = DefaultHeap::new(&mut arena);
    info!(
        "running {} scenario, capacity={}",
        args.scenario,
        heap.capacity()
    );

    args.scenario
        .run(&mut heap)
        .with_whatever_context(|_| format!("failed to run {} scenario", args.scenario))?;
    info!("{}", heap.stats());

    print!("{heap}");
    Ok(())
}
