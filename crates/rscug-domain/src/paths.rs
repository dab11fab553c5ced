//! Path helpers shared by the access control modules.

use rscug_storage::path;

/// Returns the path of the node governed by an access control node.
///
/// Items inside a control node (e.g. `/content/a/rep:cugPolicy` or anything
/// below it) are evaluated as their owner `/content/a`. Other paths are
/// returned unchanged.
pub(crate) fn control_owner<'a>(at: &'a str, control_name: &str) -> &'a str {
    let mut end = 0;
    for element in path::elements(at) {
        if element == control_name {
            return if end == 0 { path::ROOT_PATH } else { &at[..end] };
        }
        end += element.len() + 1;
    }
    at
}

/// True when the path addresses an access control node or an item below it.
pub(crate) fn is_control_path(at: &str, control_name: &str) -> bool {
    path::elements(at).any(|e| e == control_name)
}
