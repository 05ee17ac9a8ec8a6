// Status code selection for echoed requests
//
// A body of exactly `"erro"` is reported as not found, everything else
// succeeds. The body itself is never touched.

/// Body value that switches the response to the not-found status
pub const ERROR_TRIGGER_BODY: &str = "erro";

/// Success status
pub const STATUS_OK: u16 = 200;

/// Not-found status, returned for [`ERROR_TRIGGER_BODY`]
pub const STATUS_NOT_FOUND: u16 = 404;

/// Choose the status code for a request body
///
/// Comparison is exact: no trimming, no case folding.
pub fn status_for_body(body: &str) -> u16 {
    if body == ERROR_TRIGGER_BODY {
        STATUS_NOT_FOUND
    } else {
        STATUS_OK
    }
}
