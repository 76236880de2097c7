// Strict mode — build-time switch for contract checks
//
// Two tiers of failure exist in pixelnet. Structural problems (shape
// mismatches, wrong arity, ...) are always reported through `Result`.
// Contract violations (out-of-bounds offsets, access to unallocated storage,
// unintentional deep copies, reading host data while the device copy is
// authoritative) are checked only in strict mode, where they panic with a
// message naming the tensor's shape and the offending indices.
//
// Strict mode follows the build profile:
//
//   debug build                       → strict
//   release build                     → unchecked
//   `--features strict`               → strict in every profile
//   `--features unchecked`            → unchecked in every profile
//
// With the checks compiled out, an invalid offset is still caught by slice
// bounds checking wherever it is dereferenced, but the message no longer
// names the tensor and an out-of-range axis that stays inside the buffer
// silently aliases another element.

/// Whether contract checks are compiled in.
pub const STRICT: bool = cfg!(all(
    not(feature = "unchecked"),
    any(debug_assertions, feature = "strict")
));

/// Halt with a contract-violation message when strict mode is active.
///
/// The message is only formatted when the check fails.
#[macro_export]
macro_rules! contract {
    ($cond:expr, $($arg:tt)*) => {
        if $crate::config::STRICT && !($cond) {
            panic!($($arg)*);
        }
    };
}
