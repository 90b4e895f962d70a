/// Integer percent in `[0, 100]`. `initializing` and `running` are derived,
/// never stored independently, so they can't drift out of sync with the
/// percent that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapState {
    pub percent: u8,
    pub control_auth_ok: bool,
    pub process_alive: bool,
    /// Set by a `[err]` line; cleared by the next bootstrap percent
    /// update, since that means the daemon is logging progress again.
    forced_off: bool,
}

impl BootstrapState {
    pub fn new() -> Self {
        Self {
            percent: 0,
            control_auth_ok: false,
            process_alive: true,
            forced_off: false,
        }
    }

    pub fn initializing(&self) -> bool {
        !self.forced_off && self.percent > 0 && self.percent < 100
    }

    pub fn running(&self) -> bool {
        !self.forced_off && self.percent == 100 && self.process_alive && self.control_auth_ok
    }
}

impl Default for BootstrapState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single stdout line implies for the state machine. Pure and
/// I/O-free so the parsing rules can be unit tested without a process.
#[derive(Debug, PartialEq, Eq)]
pub enum StdoutSignal {
    BootstrapPercent(u8),
    HiddenServiceOnline,
    SeverityWarn,
    SeverityErr,
    Noise,
}

/// Finds `Bootstrapped...NN%` anywhere in the line and returns `NN`,
/// without pulling in a regex dependency for one pattern.
fn parse_bootstrap_percent(line: &str) -> Option<u8> {
    let after = line.split("Bootstrapped").nth(1)?;
    let digits_start = after.find(|c: char| c.is_ascii_digit())?;
    let rest = &after[digits_start..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    if !rest[digits_end..].starts_with('%') {
        return None;
    }
    rest[..digits_end].parse::<u32>().ok().map(|v| v.min(100) as u8)
}

/// Severity is only recognized from the daemon's own bracketed form,
/// e.g. `[warn]`/`[err]`. A bare "error"/"failed" substring is
/// deliberately not treated as a severity signal.
fn bracketed_severity(line: &str) -> Option<&'static str> {
    if line.contains("[err]") {
        Some("err")
    } else if line.contains("[warn]") {
        Some("warn")
    } else {
        None
    }
}

pub fn classify(line: &str) -> StdoutSignal {
    if let Some(pct) = parse_bootstrap_percent(line) {
        return StdoutSignal::BootstrapPercent(pct);
    }
    if line.contains("Hidden-service online") {
        return StdoutSignal::HiddenServiceOnline;
    }
    match bracketed_severity(line) {
        Some("err") => StdoutSignal::SeverityErr,
        Some("warn") => StdoutSignal::SeverityWarn,
        _ => StdoutSignal::Noise,
    }
}

impl BootstrapState {
    /// Applies a classified stdout line. Returns `true` if this line
    /// crossed into 100% for the first time (the caller uses this to
    /// schedule the one-shot control connect after a grace period).
    pub fn apply(&mut self, signal: &StdoutSignal) -> bool {
        match signal {
            StdoutSignal::BootstrapPercent(pct) => {
                let crossed_100 = self.percent != 100 && *pct == 100;
                self.percent = *pct;
                self.forced_off = false;
                crossed_100
            }
            StdoutSignal::HiddenServiceOnline => {
                self.percent = 100;
                false
            }
            StdoutSignal::SeverityErr => {
                self.forced_off = true;
                false
            }
            StdoutSignal::SeverityWarn | StdoutSignal::Noise => false,
        }
    }
}
