use row_relay::Relay::{
    DispatchError, DispatcherBuilder, DispatcherConfig, ProcessedView, ProcessingError, Record,
    RecordHandler, StreamContext,
};
use row_relay::Context;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sums the numeric value of one column, slowly.
struct ColumnTotals {
    column: usize,
    delay: Duration,
    total: f64,
    skipped: u64,
}

impl RecordHandler<StreamContext> for ColumnTotals {
    fn process_started(&mut self, context: &StreamContext) -> Result<(), ProcessingError> {
        if let Some(headers) = context.headers() {
            let name = headers.get(self.column).ok_or_else(|| {
                ProcessingError::new(format!("no column {} in header", self.column))
            })?;
            println!("Summing column {:?}", name);
        }
        Ok(())
    }

    fn record_processed(
        &mut self,
        record: &Record,
        context: &ProcessedView<StreamContext>,
    ) -> Result<(), ProcessingError> {
        std::thread::sleep(self.delay);
        match record.get(self.column).map(str::trim).map(str::parse::<f64>) {
            Some(Ok(value)) => self.total += value,
            Some(Err(err)) => {
                return Err(ProcessingError::with_source(
                    format!("column {} is not a number", self.column),
                    err,
                ))
            }
            None => self.skipped += 1,
        }
        if context.current_record() % 1000 == 0 {
            println!(
                "  handled {} of {} rows",
                context.current_record(),
                context.produced()
            );
        }
        Ok(())
    }

    fn process_ended(&mut self, context: &StreamContext) -> Result<(), ProcessingError> {
        println!(
            "Total {:.3} over {} rows ({} without a value)",
            self.total,
            context.current_record(),
            self.skipped
        );
        Ok(())
    }
}

fn split(line: &str) -> Record {
    Record::new(line.split(',').map(|cell| {
        let cell = cell.trim();
        (!cell.is_empty()).then(|| cell.to_string())
    }))
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let input: Box<dyn BufRead> = match args.get(1).map(String::as_str) {
        None | Some("-") => Box::new(BufReader::new(io::stdin())),
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
    };
    let column = args.get(2).and_then(|c| c.parse().ok()).unwrap_or(0);

    let config = DispatcherConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut dispatcher = DispatcherBuilder::new()
        .with_config(config)
        .build_for_stream(ColumnTotals {
            column,
            delay: Duration::from_micros(200),
            total: 0.0,
            skipped: 0,
        });

    // First Ctrl-C stops reading, second one abandons the queued rows
    let handle = dispatcher.handle();
    let presses = Arc::new(AtomicU32::new(0));
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("Interrupted, finishing queued rows (Ctrl-C again to abort)");
            handle.interrupt_producer();
        } else {
            handle.abort_worker();
        }
    })
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let mut lines = input.lines();
    let headers = match lines.next() {
        Some(line) => split(&line?),
        None => return Ok(()),
    };
    let context =
        StreamContext::new().with_headers(headers.iter().map(|h| h.unwrap_or("").to_string()));

    let start = Instant::now();
    dispatcher
        .on_start(&context)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        context.record_produced();
        match dispatcher.on_record(split(&line), &context) {
            Ok(()) => {}
            Err(DispatchError::Interrupted) => break,
            Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
    println!(
        "Parsed {} rows in {:?}, waiting for the worker",
        context.current_record(),
        start.elapsed()
    );

    match dispatcher.on_end(&context) {
        Ok(()) => {
            println!("Done in {:?}", start.elapsed());
            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline failed: {}", e);
            if let Some(cause) = e.processing_error() {
                eprintln!("  caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
