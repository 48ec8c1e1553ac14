use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("crc mismatch on word {word:#06x} (got {got:#04x}, expected {expected:#04x})")]
    Crc { word: u16, got: u8, expected: u8 },
    #[error("{sensor} self-test failed with status {status:#06x}")]
    SelfTest { sensor: &'static str, status: u16 },
    #[error("no new data")]
    NoNewData,
    #[error("oxygen probe {vendor_id:#06x}:{product_id:#06x} not found")]
    ProbeNotFound { vendor_id: u16, product_id: u16 },
    #[error("usb error: {0}")]
    Usb(String),
    #[error("cannot read probe serial number: {0}")]
    Serial(String),
    #[error("cannot claim probe interface: {0}")]
    Claim(String),
    #[error("simulated fault: {0}")]
    Simulated(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
