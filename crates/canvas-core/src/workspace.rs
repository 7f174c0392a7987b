use crate::error::CanvasError;
use html_escape::encode_text;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Deepest directory nesting accepted from a workspace tree report.
pub const MAX_TREE_DEPTH: usize = 64;

/// A workspace tree as reported by an agent: directories map names to
/// children, leaves are plain file lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Directory(Vec<(String, TreeNode)>),
    FileList(Vec<String>),
}

impl TreeNode {
    /// Directory levels below this node; a file list has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::FileList(_) => 0,
            TreeNode::Directory(children) => {
                1 + children
                    .iter()
                    .map(|(_, child)| child.depth())
                    .max()
                    .unwrap_or(0)
            }
        }
    }
}

impl<'de> Deserialize<'de> for TreeNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TreeNodeVisitor;

        impl<'de> Visitor<'de> for TreeNodeVisitor {
            type Value = TreeNode;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a directory mapping or a list of file names")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut children = Vec::new();
                while let Some((name, child)) = map.next_entry::<String, TreeNode>()? {
                    children.push((name, child));
                }
                Ok(TreeNode::Directory(children))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut files = Vec::new();
                while let Some(file) = seq.next_element::<String>()? {
                    files.push(file);
                }
                Ok(TreeNode::FileList(files))
            }
        }

        deserializer.deserialize_any(TreeNodeVisitor)
    }
}

/// Parses and depth-checks a workspace tree document.
pub fn parse_tree(tree_json: &str) -> Result<TreeNode, CanvasError> {
    let tree: TreeNode = serde_json::from_str(tree_json)
        .map_err(|err| CanvasError::MalformedTree(err.to_string()))?;
    let depth = tree.depth();
    if depth > MAX_TREE_DEPTH {
        return Err(CanvasError::TreeTooDeep {
            depth,
            limit: MAX_TREE_DEPTH,
        });
    }
    Ok(tree)
}

fn render_tree(tree: &TreeNode) -> String {
    let mut html = String::from("<h3>Workspace Files</h3><ul>");
    render_node(tree, &mut html);
    html.push_str("</ul>");
    html
}

fn render_node(node: &TreeNode, html: &mut String) {
    match node {
        TreeNode::Directory(children) => {
            for (name, child) in children {
                html.push_str(&format!("<li><strong>{}/</strong><ul>", encode_text(name)));
                render_node(child, html);
                html.push_str("</ul></li>");
            }
        }
        TreeNode::FileList(files) => {
            for file in files {
                html.push_str(&format!("<li>{}</li>", encode_text(file)));
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum WorkspaceProjection {
    #[default]
    Empty,
    Tree(TreeNode),
    LastUpdated {
        path: String,
        content: String,
    },
}

/// Last-writer-wins view of the agents' workspace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceView {
    projection: WorkspaceProjection,
}

impl WorkspaceView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_tree(&mut self, tree_json: &str) -> Result<(), CanvasError> {
        let tree = parse_tree(tree_json)?;
        self.set_tree(tree);
        Ok(())
    }

    pub fn set_tree(&mut self, tree: TreeNode) {
        self.projection = WorkspaceProjection::Tree(tree);
    }

    pub fn update_file(&mut self, path: &str, content: &str) {
        self.projection = WorkspaceProjection::LastUpdated {
            path: path.to_string(),
            content: content.to_string(),
        };
    }

    pub fn render(&self) -> String {
        match &self.projection {
            WorkspaceProjection::Empty => String::new(),
            WorkspaceProjection::Tree(tree) => render_tree(tree),
            WorkspaceProjection::LastUpdated { path, content } => format!(
                "<h4>Last Updated: {}</h4><pre><code>{}</code></pre>",
                encode_text(path),
                encode_text(content)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TREE: &str = r#"{
        "workspace": {
            "agents": ["SystemAgent.py", "SearchAgent.py"],
            "tasks": {"visualization_task": ["plan.md"]},
            "output": ["report.md"]
        }
    }"#;

    #[test]
    fn tree_renders_nested_markup_in_document_order() {
        let mut view = WorkspaceView::new();
        view.load_tree(SAMPLE_TREE).unwrap();

        assert_eq!(
            view.render(),
            "<h3>Workspace Files</h3><ul>\
             <li><strong>workspace/</strong><ul>\
             <li><strong>agents/</strong><ul><li>SystemAgent.py</li><li>SearchAgent.py</li></ul></li>\
             <li><strong>tasks/</strong><ul>\
             <li><strong>visualization_task/</strong><ul><li>plan.md</li></ul></li>\
             </ul></li>\
             <li><strong>output/</strong><ul><li>report.md</li></ul></li>\
             </ul></li></ul>"
        );
    }

    #[test]
    fn top_level_file_list_is_accepted() {
        let tree = parse_tree(r#"["a.txt", "b.txt"]"#).unwrap();
        assert_eq!(
            tree,
            TreeNode::FileList(vec!["a.txt".to_string(), "b.txt".to_string()])
        );
    }

    #[test]
    fn malformed_trees_are_rejected_without_touching_the_view() {
        let mut view = WorkspaceView::new();
        view.update_file("notes.md", "keep me");

        let bad_inputs = [
            "not json",
            "42",
            r#""just a string""#,
            "null",
            r#"{"dir": 7}"#,
            r#"[1, 2]"#,
        ];
        for bad in bad_inputs {
            let err = view.load_tree(bad).unwrap_err();
            assert!(matches!(err, CanvasError::MalformedTree(_)), "{bad}: {err:?}");
        }
        assert!(view.render().contains("keep me"));
    }

    #[test]
    fn pathological_depth_is_capped() {
        let depth = MAX_TREE_DEPTH + 1;
        let json = format!("{}[]{}", r#"{"d":"#.repeat(depth), "}".repeat(depth));
        assert_eq!(
            parse_tree(&json),
            Err(CanvasError::TreeTooDeep {
                depth,
                limit: MAX_TREE_DEPTH
            })
        );

        let ok = format!(
            "{}[]{}",
            r#"{"d":"#.repeat(MAX_TREE_DEPTH),
            "}".repeat(MAX_TREE_DEPTH)
        );
        assert_eq!(parse_tree(&ok).map(|tree| tree.depth()), Ok(MAX_TREE_DEPTH));
    }

    #[test]
    fn file_update_replaces_tree_wholesale() {
        let mut view = WorkspaceView::new();
        view.load_tree(SAMPLE_TREE).unwrap();
        view.update_file("/workspace/output/report.md", "# Report\n<b>done</b>");

        let html = view.render();
        assert_eq!(
            html,
            "<h4>Last Updated: /workspace/output/report.md</h4>\
             <pre><code># Report\n&lt;b&gt;done&lt;/b&gt;</code></pre>"
        );
        assert!(!html.contains("Workspace Files"));
        assert!(matches!(
            view.projection,
            WorkspaceProjection::LastUpdated { .. }
        ));
    }

    #[test]
    fn tree_names_are_rendered_as_text() {
        let mut view = WorkspaceView::new();
        view.load_tree(r#"{"<script>": ["a&b.md", "<img src=x>"]}"#).unwrap();

        assert_eq!(
            view.render(),
            "<h3>Workspace Files</h3><ul>\
             <li><strong>&lt;script&gt;/</strong><ul>\
             <li>a&amp;b.md</li><li>&lt;img src=x&gt;</li>\
             </ul></li></ul>"
        );
    }

    #[test]
    fn empty_view_renders_nothing() {
        assert_eq!(WorkspaceView::new().render(), "");
    }
}
