use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn is_machine(self) -> bool {
        self != OutputFormat::Table
    }
}

/// Writes `value` as pretty JSON or YAML. Table output is left to the caller.
pub fn write_data<W: Write, T: Serialize + ?Sized>(out: &mut W, format: OutputFormat, value: &T) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Table => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputFormat::Yaml => {
            serde_yaml::to_writer(&mut *out, value)?;
        }
    }
    Ok(())
}

pub fn print_data<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_data(&mut lock, format, value)
}
