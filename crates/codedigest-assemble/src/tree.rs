//! ASCII tree rendering for scanned node forests.

use codedigest_core::ContentNode;

/// Render a node forest as an ASCII tree rooted at `root_name`.
pub fn render_tree(root_name: &str, nodes: &[ContentNode]) -> String {
    let mut out = String::new();
    out.push_str(root_name);
    out.push('\n');
    render_children(nodes, "", &mut out);
    out
}

fn render_children(nodes: &[ContentNode], prefix: &str, out: &mut String) {
    let last = nodes.len().saturating_sub(1);
    for (index, node) in nodes.iter().enumerate() {
        let is_last = index == last;
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        out.push_str(&node.name);
        if node.is_dir() {
            out.push('/');
        }
        out.push('\n');
        if !node.children.is_empty() {
            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
            render_children(&node.children, &child_prefix, out);
        }
    }
}
