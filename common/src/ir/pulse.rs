#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkSpace {
    pub mark_us: u32,
    pub space_us: u32,
}

impl MarkSpace {
    pub const fn new(mark_us: u32, space_us: u32) -> Self {
        Self { mark_us, space_us }
    }

    pub const fn duration_us(&self) -> u32 {
        self.mark_us + self.space_us
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carrier {
    pub frequency_hz: u32,
    pub duty_percent: u8,
}

impl Carrier {
    pub const fn new(frequency_hz: u32, duty_percent: u8) -> Self {
        Self {
            frequency_hz,
            duty_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseTrain {
    symbols: Vec<MarkSpace>,
}

impl PulseTrain {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, mark_us: u32, space_us: u32) {
        self.symbols.push(MarkSpace::new(mark_us, space_us));
    }

    pub fn symbols(&self) -> &[MarkSpace] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn total_us(&self) -> u64 {
        self.symbols
            .iter()
            .map(|symbol| u64::from(symbol.duration_us()))
            .sum()
    }

    // Mark, space, mark, space...
    pub fn raw_timings(&self) -> impl Iterator<Item = u32> + '_ {
        self.symbols
            .iter()
            .flat_map(|symbol| [symbol.mark_us, symbol.space_us])
    }
}
