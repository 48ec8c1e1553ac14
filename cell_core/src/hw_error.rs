//! Maps `Box<dyn Error>` from trait boundaries to typed `CellError`.
//!
//! The traits in `cell_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `cell_hardware::HwError` downcasting.

use crate::error::CellError;

/// Map a trait-boundary error raised by `sensor` to a typed `CellError`.
pub fn map_hw_error(sensor: &'static str, e: &(dyn std::error::Error + 'static)) -> CellError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<cell_hardware::error::HwError>() {
            use cell_hardware::error::HwError;
            return match hw {
                HwError::NoNewData => CellError::NoNewData,
                HwError::ProbeNotFound { .. }
                | HwError::Usb(_)
                | HwError::Serial(_)
                | HwError::Claim(_) => CellError::ProbeConnect(hw.to_string()),
                other => CellError::BusFault {
                    sensor,
                    message: other.to_string(),
                },
            };
        }
    }

    if let Some(cell) = e.downcast_ref::<CellError>() {
        return cell.clone();
    }

    CellError::BusFault {
        sensor,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_become_bus_faults() {
        let e = std::io::Error::other("nack");
        assert_eq!(
            map_hw_error("co2", &e),
            CellError::BusFault {
                sensor: "co2",
                message: "nack".into()
            }
        );
    }

    #[test]
    fn typed_errors_pass_through() {
        let e = CellError::ProbeTimeout(3000);
        assert_eq!(map_hw_error("probe", &e), CellError::ProbeTimeout(3000));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hardware_errors_are_downcast() {
        use cell_hardware::error::HwError;
        let e = HwError::ProbeNotFound {
            vendor_id: 1,
            product_id: 2,
        };
        assert!(matches!(
            map_hw_error("probe", &e),
            CellError::ProbeConnect(_)
        ));
        assert_eq!(map_hw_error("co2", &HwError::NoNewData), CellError::NoNewData);
    }
}
