//! Decides the request-target form the engine writes on the request line.

use bytes::Bytes;

use crate::request::Request;

/// Whether to write `/path?query` (origin-form) or
/// `http://host[:port]/path?query` (absolute-form) on the request line.
///
/// Origin-form is used for direct and tunnel-proxied connections, where the
/// connection already terminates at (or tunnels through to) the target host.
/// Absolute-form is used only for a plain (non-tunneling) forward proxy,
/// which needs the full URL to know where to relay the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetForm {
    Origin,
    Absolute,
}

pub(crate) fn request_target(request: &Request, form: TargetForm) -> Bytes {
    match form {
        TargetForm::Origin => {
            if request.url.target.is_empty() {
                Bytes::from_static(b"/")
            } else {
                request.url.target.clone()
            }
        }
        TargetForm::Absolute => request.url.absolute_form(),
    }
}
