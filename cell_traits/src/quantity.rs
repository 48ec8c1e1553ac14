use std::fmt;

/// Physical quantities tracked by the measurement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    O2,
    Luminosity,
}

impl Quantity {
    pub const COUNT: usize = 6;

    pub const ALL: [Quantity; Self::COUNT] = [
        Quantity::Temperature,
        Quantity::Humidity,
        Quantity::Pressure,
        Quantity::Co2,
        Quantity::O2,
        Quantity::Luminosity,
    ];

    /// Dense index, stable across releases; used to address per-quantity storage.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Quantity::Temperature => 0,
            Quantity::Humidity => 1,
            Quantity::Pressure => 2,
            Quantity::Co2 => 3,
            Quantity::O2 => 4,
            Quantity::Luminosity => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::Pressure => "pressure",
            Quantity::Co2 => "CO2",
            Quantity::O2 => "O2",
            Quantity::Luminosity => "luminosity",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reading of one quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub quantity: Quantity,
    pub value: f64,
}

impl Sample {
    #[inline]
    pub const fn new(quantity: Quantity, value: f64) -> Self {
        Self { quantity, value }
    }
}
