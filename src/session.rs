//! Session controller state machine.
//!
//! Orchestrates one run: Discover -> SelectInstrument -> Configure ->
//! ConfirmWiring -> MeasurementLoop -> Shutdown. Recoverable conditions
//! (invalid input, unparsable readings, near-zero measurements) are handled
//! inside the loop; fatal conditions unwind as [`CellLogError`] and the
//! instrument handle's `Drop` still returns the meter to local control.
//!
//! The controller is generic over its input/output streams so integration
//! tests can drive a whole session with scripted text.

use crate::bus::InstrumentBus;
use crate::config::Settings;
use crate::error::{AppResult, CellLogError};
use crate::input::{parse_bounded_int, parse_cell_or_cancel, parse_yes_no, CellEntry, YesNo};
use crate::instrument::{probe_instruments, Dmm, ReadError};
use crate::storage::{CellRecord, VoltageLog};
use chrono::Local;
use log::info;
use std::io::{BufRead, Write};
use std::path::Path;

const BANNER_RULE: &str =
    "===============================================================================";

/// Interactive session over one operator, one instrument, one log file.
pub struct SessionController<R, W> {
    input: R,
    output: W,
    settings: Settings,
}

impl<R: BufRead, W: Write> SessionController<R, W> {
    /// Create a controller reading operator input from `input` and writing
    /// the operator protocol to `output`.
    pub fn new(input: R, output: W, settings: Settings) -> Self {
        Self {
            input,
            output,
            settings,
        }
    }

    /// Run one full session. Returns `Ok(())` only on an operator-confirmed
    /// quit; every fatal condition comes back as an error after cleanup.
    pub fn run(&mut self, bus: &dyn InstrumentBus, log_path: &Path) -> AppResult<()> {
        self.print_banner()?;

        // Discover
        let probed = probe_instruments(bus)?;
        writeln!(self.output, "Detected instruments:")?;
        for (index, instrument) in probed.iter().enumerate() {
            writeln!(self.output, "{}. {}", index + 1, instrument.address)?;
            match &instrument.identity {
                Some(identity) => writeln!(self.output, "   {identity}")?,
                None => writeln!(self.output, "   ERROR communicating with instrument")?,
            }
        }
        writeln!(self.output)?;
        if probed.is_empty() {
            writeln!(
                self.output,
                "ERROR: No instruments found. Check connection and try again."
            )?;
            return Err(CellLogError::NoInstrumentsFound);
        }

        // SelectInstrument
        let count = u32::try_from(probed.len()).unwrap_or(u32::MAX);
        let choice = self.prompt_bounded_int("Select the DMM measuring VOLTAGE", count)?;
        let address = &probed[(choice - 1) as usize].address;
        info!("Operator selected instrument at '{}'", address);

        let device = bus.open(address)?;
        let mut dmm = Dmm::new(device, &self.settings.meter);

        // Optional front-panel label so the operator can check the meter
        if let Err(e) = dmm.display_text("VOLTMETER") {
            writeln!(self.output, "Note: DMM display label not supported ({e}).")?;
        }

        // Configure
        dmm.configure()?;

        // ConfirmWiring
        if self.prompt_yes_no("Does the DMM label match the wiring?")? == YesNo::No {
            writeln!(self.output, "Re-run the program once wiring is corrected.")?;
            return Err(CellLogError::WiringDeclined);
        }

        // MeasurementLoop
        let mut log = VoltageLog::open(log_path)?;
        self.measurement_loop(&mut dmm, &mut log)?;

        // Shutdown
        dmm.shutdown();
        writeln!(self.output, "All done. Data saved to:")?;
        writeln!(self.output, "{}", log.path().display())?;
        Ok(())
    }

    fn print_banner(&mut self) -> AppResult<()> {
        writeln!(self.output, "{BANNER_RULE}")?;
        writeln!(self.output, "   Battery Cell Open-Circuit Voltage Logger")?;
        writeln!(self.output, "{BANNER_RULE}")?;
        writeln!(
            self.output,
            "This program measures and records the DC voltage of individual cells."
        )?;
        writeln!(
            self.output,
            "Make sure the DMM leads are connected directly across the cell under test."
        )?;
        writeln!(
            self.output,
            "Enter the cell number when prompted or 'c' to quit.\n"
        )?;
        Ok(())
    }

    fn measurement_loop(&mut self, dmm: &mut Dmm, log: &mut VoltageLog) -> AppResult<()> {
        let limits = self.settings.limits.clone();

        loop {
            let cell = match self.prompt_cell_or_cancel(limits.max_cells)? {
                CellEntry::Cancel => {
                    if self.prompt_yes_no("Are you sure you want to exit?")? == YesNo::Yes {
                        return Ok(());
                    }
                    continue;
                }
                CellEntry::Cell(cell) => cell,
            };

            if log.is_known(cell) {
                let answer = self.prompt_yes_no(
                    "This cell number has already been entered. \
                     Are you sure you want to measure this one?",
                )?;
                if answer == YesNo::No {
                    writeln!(self.output, "Okay. Try again:")?;
                    continue;
                }
            } else {
                // Marked at entry time, before a reading exists: a later
                // discarded attempt still counts as "already entered" for
                // duplicate prompts in this session.
                log.mark_known(cell);
            }

            writeln!(self.output, "Measuring... please wait...")?;
            let volts = match dmm.trigger_read() {
                Ok(volts) => volts,
                Err(ReadError::Parse { response }) => {
                    writeln!(
                        self.output,
                        "ERROR: Could not parse reading {response:?}. Retrying..."
                    )?;
                    continue;
                }
                Err(ReadError::Comm(e)) => {
                    writeln!(
                        self.output,
                        "ERROR: Instrument communication failed ({e}). Retrying..."
                    )?;
                    continue;
                }
            };

            if volts < limits.zero_floor {
                writeln!(self.output, "ERROR: Voltage ~0V. Is a cell connected?")?;
                continue;
            }
            if !(limits.min_plausible_volts..=limits.max_plausible_volts).contains(&volts) {
                writeln!(
                    self.output,
                    "WARNING: Voltage out of expected range ({}-{}V).",
                    limits.min_plausible_volts, limits.max_plausible_volts
                )?;
            }

            let record = CellRecord {
                cell,
                timestamp: Local::now(),
                volts,
            };
            log.append(&record)?;
            writeln!(self.output, "Cell {cell}: {volts:.6} V")?;
        }
    }

    /// One prompt/read cycle. A closed input stream is fatal: invalid input
    /// can be re-asked, EOF cannot.
    fn prompt_line(&mut self, prompt: &str) -> AppResult<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CellLogError::InputClosed);
        }
        Ok(line)
    }

    fn prompt_bounded_int(&mut self, prompt: &str, upper: u32) -> AppResult<u32> {
        loop {
            let line = self.prompt_line(&format!("{prompt} (1-{upper}): "))?;
            if let Some(value) = parse_bounded_int(&line, 1, upper) {
                return Ok(value);
            }
            writeln!(self.output, "Invalid selection. Try again.")?;
        }
    }

    fn prompt_yes_no(&mut self, prompt: &str) -> AppResult<YesNo> {
        loop {
            let line = self.prompt_line(&format!("{prompt} [y|n]: "))?;
            if let Some(answer) = parse_yes_no(&line) {
                return Ok(answer);
            }
            writeln!(self.output, "Please type 'y' or 'n'.")?;
        }
    }

    fn prompt_cell_or_cancel(&mut self, max_cells: u32) -> AppResult<CellEntry> {
        loop {
            let line = self.prompt_line(&format!(
                "Enter cell number [1-{max_cells}] or 'c' to quit: "
            ))?;
            if let Some(entry) = parse_cell_or_cancel(&line, max_cells) {
                return Ok(entry);
            }
            writeln!(self.output, "Invalid entry. Try again.")?;
        }
    }
}
