use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;

use spreadwatch::batch::BatchLoop;
use spreadwatch::config::Config;
use spreadwatch::error::EngineError;
use spreadwatch::logging;

fn main() -> ExitCode {
    logging::init();
    let config = Config::parse();

    let file = match File::open(&config.input) {
        Ok(file) => file,
        Err(e) => {
            let err = EngineError::InputUnavailable {
                path: config.input.clone(),
                message: e.to_string(),
            };
            eprintln!("[WARN] {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut batch_loop = BatchLoop::new(BufReader::new(file), config.instrument, config.strategy_params());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = batch_loop.run(&mut out, config.quiet).and_then(|()| out.flush());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[WARN] output error: {e}");
            ExitCode::FAILURE
        }
    }
}
