use std::ffi::c_char;

use renterbind_currency::{format, parse, Currency};

use crate::guard::{c_str, guarded, into_c_string};

/// Parse unit-suffixed currency text (`"1.5SC"`, `"300mS"`, `"42H"`) and
/// return the amount as a decimal count of base units. Free with
/// `us_string_free`.
///
/// # Safety
///
/// `text` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_currency_parse(ctx: usize, text: *const c_char) -> *mut c_char {
    guarded(ctx, "us_currency_parse", std::ptr::null_mut(), || {
        let amount = parse(c_str(text, "text")?)?;
        into_c_string(amount.to_string())
    })
}

/// Render a decimal count of base units with the largest fitting unit.
/// Free with `us_string_free`.
///
/// # Safety
///
/// `base_units` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_currency_format(
    ctx: usize,
    base_units: *const c_char,
) -> *mut c_char {
    guarded(ctx, "us_currency_format", std::ptr::null_mut(), || {
        let amount = Currency::from_decimal(c_str(base_units, "base_units")?)?;
        into_c_string(format(&amount))
    })
}
