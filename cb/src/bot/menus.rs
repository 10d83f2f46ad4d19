//! Menu Registry
//!
//! Each role has one menu tree written in YAML. Builtin trees are embedded
//! in the binary; a directory holding `<role>.yml` files replaces the
//! builtin tree of every role it covers.
//!
//! Nodes are either branches (children, no action) or leaves (an action, no
//! children). Ids are unique across all trees, which lets `nav:<id>`
//! payloads address any node.

use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{ActionId, Button, ButtonStyle, Keyboard, Language, OutgoingMessage, Role};

use super::{ACTION_PREFIX, NAV_PREFIX};

const BUILTIN_APPLICANT: &str = include_str!("builtin_menus/applicant.yml");
const BUILTIN_STUDENT: &str = include_str!("builtin_menus/student.yml");
const BUILTIN_EMPLOYEE: &str = include_str!("builtin_menus/employee.yml");
const BUILTIN_LEADERSHIP: &str = include_str!("builtin_menus/leadership.yml");

/// Embedded YAML tree for a role
pub fn builtin_source(role: Role) -> &'static str {
    match role {
        Role::Applicant => BUILTIN_APPLICANT,
        Role::Student => BUILTIN_STUDENT,
        Role::Employee => BUILTIN_EMPLOYEE,
        Role::Leadership => BUILTIN_LEADERSHIP,
    }
}

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Failed to parse {role} menu: {source}")]
    Parse {
        role: Role,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read menu file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate menu id: {0}")]
    DuplicateId(String),

    #[error("Menu node {0} has both an action and children")]
    BranchAndLeaf(String),

    #[error("Menu node {0} has neither an action nor children")]
    EmptyNode(String),

    #[error("Menu node {id} refers to unknown action {action}")]
    UnknownAction { id: String, action: String },

    #[error("No menu defined for role {0}")]
    MissingRoot(Role),
}

/// Text with Russian and English variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Localized {
    #[serde(default)]
    pub ru: String,
    #[serde(default)]
    pub en: String,
}

impl Localized {
    /// Variant for `language`, falling back to Russian when it is blank
    pub fn get(&self, language: Language) -> &str {
        let text = match language {
            Language::Ru => &self.ru,
            Language::En => &self.en,
        };
        if text.trim().is_empty() { &self.ru } else { text }
    }
}

#[derive(Debug, Deserialize)]
struct MenuSource {
    id: String,
    title: Localized,
    #[serde(default)]
    description: Option<Localized>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    children: Vec<MenuSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: Localized,
    pub description: Option<Localized>,
    pub action: Option<ActionId>,
    pub children: Vec<String>,
}

impl MenuNode {
    pub fn title(&self, language: Language) -> &str {
        self.title.get(language)
    }

    /// Description text, empty when the node has none
    pub fn description(&self, language: Language) -> &str {
        self.description.as_ref().map(|d| d.get(language)).unwrap_or("")
    }

    pub fn is_leaf(&self) -> bool {
        self.action.is_some()
    }
}

/// Read-only index of every menu node plus each role's root
#[derive(Debug, Clone, Default)]
pub struct MenuRegistry {
    nodes: HashMap<String, MenuNode>,
    roots: HashMap<Role, String>,
}

impl MenuRegistry {
    /// Registry built from the embedded trees only
    pub fn builtin() -> Result<Self, MenuError> {
        Self::load(None)
    }

    /// Load every role, preferring `<dir>/<role>.yml` over the builtin tree
    pub fn load(dir: Option<&Path>) -> Result<Self, MenuError> {
        debug!(?dir, "MenuRegistry::load: called");
        let mut sources: Vec<(Role, Cow<'static, str>)> = Vec::new();
        for role in Role::ALL {
            let override_path = dir.map(|d| d.join(format!("{role}.yml"))).filter(|p| p.exists());
            let text = match override_path {
                Some(path) => {
                    info!(%role, ?path, "Loading menu override");
                    let text = fs::read_to_string(&path).map_err(|source| MenuError::Io { path, source })?;
                    Cow::Owned(text)
                }
                None => Cow::Borrowed(builtin_source(role)),
            };
            sources.push((role, text));
        }
        Self::from_sources(sources.iter().map(|(role, text)| (*role, text.as_ref())))
    }

    /// Build a registry from YAML documents; every role must be present
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = (Role, &'a str)>) -> Result<Self, MenuError> {
        let mut registry = Self::default();
        for (role, text) in sources {
            let root: MenuSource = serde_yaml::from_str(text).map_err(|source| MenuError::Parse { role, source })?;
            let root_id = root.id.clone();
            registry.register(root, None)?;
            debug!(%role, %root_id, "from_sources: registered tree");
            registry.roots.insert(role, root_id);
        }

        if let Some(role) = Role::ALL.into_iter().find(|r| !registry.roots.contains_key(r)) {
            return Err(MenuError::MissingRoot(role));
        }

        info!(nodes = registry.nodes.len(), "Loaded menus");
        Ok(registry)
    }

    fn register(&mut self, source: MenuSource, parent_id: Option<&str>) -> Result<(), MenuError> {
        let MenuSource {
            id,
            title,
            description,
            action,
            children,
        } = source;

        if self.nodes.contains_key(&id) {
            return Err(MenuError::DuplicateId(id));
        }
        let action = match (action, children.is_empty()) {
            (Some(_), false) => return Err(MenuError::BranchAndLeaf(id)),
            (None, true) => return Err(MenuError::EmptyNode(id)),
            (Some(name), true) => Some(
                name.parse::<ActionId>()
                    .map_err(|_| MenuError::UnknownAction { id: id.clone(), action: name })?,
            ),
            (None, false) => None,
        };

        let node = MenuNode {
            id: id.clone(),
            parent_id: parent_id.map(str::to_string),
            title,
            description,
            action,
            children: children.iter().map(|c| c.id.clone()).collect(),
        };
        self.nodes.insert(id.clone(), node);

        for child in children {
            self.register(child, Some(&id))?;
        }
        Ok(())
    }

    pub fn root(&self, role: Role) -> Option<&MenuNode> {
        self.roots.get(&role).and_then(|id| self.nodes.get(id))
    }

    pub fn node(&self, id: &str) -> Option<&MenuNode> {
        self.nodes.get(id)
    }

    /// Root of the tree containing `id`, found by walking parent links
    pub fn root_of(&self, id: &str) -> Option<&MenuNode> {
        let mut node = self.nodes.get(id)?;
        for _ in 0..self.nodes.len() {
            match node.parent_id.as_deref() {
                Some(parent) => node = self.nodes.get(parent)?,
                None => return Some(node),
            }
        }
        None
    }

    /// Node `id` if it belongs to the tree of `role`
    pub fn node_for(&self, role: Role, id: &str) -> Option<&MenuNode> {
        let root = self.roots.get(&role)?;
        match self.root_of(id) {
            Some(found) if &found.id == root => self.nodes.get(id),
            _ => None,
        }
    }

    /// Child nodes in declaration order
    pub fn children<'a>(&'a self, node: &'a MenuNode) -> impl Iterator<Item = &'a MenuNode> + 'a {
        node.children.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render a node as a message with one button per child
    ///
    /// Branches link with `nav:<id>`, leaves with `act:<action>`. The last
    /// row holds "Back" when the node has a parent and "Main menu" when the
    /// node is not `role`'s root.
    pub fn render(&self, node: &MenuNode, role: Role, language: Language) -> OutgoingMessage {
        debug!(id = %node.id, %role, "render: called");
        let mut text = node.title(language).to_string();
        let description = node.description(language);
        if !description.is_empty() {
            text.push_str("\n\n");
            text.push_str(description);
        }
        if node.children.is_empty() {
            return OutgoingMessage::text(text);
        }

        let mut keyboard = Keyboard::new();
        for child in self.children(node) {
            let payload = match child.action {
                Some(action) => format!("{ACTION_PREFIX}{action}"),
                None => format!("{NAV_PREFIX}{}", child.id),
            };
            keyboard.push_row(vec![Button::callback(child.title(language), payload)]);
        }

        let mut nav_row = Vec::new();
        if let Some(parent) = &node.parent_id {
            nav_row.push(
                Button::callback(language.pick("⬅ Назад", "⬅ Back"), format!("{NAV_PREFIX}{parent}"))
                    .with_style(ButtonStyle::Secondary),
            );
        }
        if let Some(root) = self.root(role)
            && root.id != node.id
        {
            nav_row.push(
                Button::callback(language.pick("🏠 В меню", "🏠 Main menu"), format!("{NAV_PREFIX}{}", root.id))
                    .with_style(ButtonStyle::Secondary),
            );
        }
        keyboard.push_row(nav_row);

        OutgoingMessage::text(text).with_keyboard(keyboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TINY: &str = r#"
id: t.root
title: { ru: "Корень", en: "Root" }
children:
  - id: t.section
    title: { ru: "Раздел" }
    children:
      - { id: t.section.help, title: { ru: "Помощь", en: "Help" }, action: faq }
  - { id: t.lang, title: { ru: "Язык", en: "Language" }, action: switch_language }
"#;

    fn with_override(role: Role, text: &'static str) -> Result<MenuRegistry, MenuError> {
        MenuRegistry::from_sources(
            Role::ALL
                .into_iter()
                .map(|r| if r == role { (r, text) } else { (r, builtin_source(r)) }),
        )
    }

    #[test]
    fn test_builtin_menus_load() {
        let registry = MenuRegistry::builtin().unwrap();
        for role in Role::ALL {
            let root = registry.root(role).unwrap();
            assert_eq!(root.id, format!("{role}.root"));
            assert!(root.parent_id.is_none());
        }
        assert!(registry.len() > 100);
    }

    #[test]
    fn test_every_builtin_action_is_reachable_from_some_role() {
        let registry = MenuRegistry::builtin().unwrap();
        let used: Vec<ActionId> = registry.nodes.values().filter_map(|n| n.action).collect();
        for action in ActionId::ALL {
            assert!(used.contains(action), "{action} is not in any menu");
        }
    }

    #[test]
    fn test_parent_ids_are_assigned() {
        let registry = MenuRegistry::builtin().unwrap();
        let leaf = registry.node("student.education.schedule").unwrap();
        assert_eq!(leaf.parent_id.as_deref(), Some("student.education"));
        assert_eq!(leaf.action, Some(ActionId::ViewSchedule));
        assert!(leaf.is_leaf());
        assert!(registry.node("student.nowhere").is_none());
    }

    #[test]
    fn test_root_of_walks_parents() {
        let registry = MenuRegistry::builtin().unwrap();
        assert_eq!(registry.root_of("student.education.schedule").unwrap().id, "student.root");
        assert_eq!(registry.root_of("leadership.root").unwrap().id, "leadership.root");
        assert!(registry.root_of("student.nowhere").is_none());
    }

    #[test]
    fn test_node_for_stays_inside_role_tree() {
        let registry = MenuRegistry::builtin().unwrap();
        assert!(registry.node_for(Role::Student, "student.education").is_some());
        assert!(registry.node_for(Role::Student, "leadership.root").is_none());
        assert!(registry.node_for(Role::Applicant, "student.education.schedule").is_none());
        assert!(registry.node_for(Role::Leadership, "leadership.root").is_some());
    }

    #[test]
    fn test_title_falls_back_to_russian() {
        let registry = with_override(Role::Student, TINY).unwrap();
        let section = registry.node("t.section").unwrap();
        assert_eq!(section.title(Language::En), "Раздел");
        assert_eq!(section.description(Language::En), "");
    }

    #[test]
    fn test_render_root_has_no_back_row() {
        let registry = MenuRegistry::builtin().unwrap();
        let root = registry.root(Role::Applicant).unwrap();
        let message = registry.render(root, Role::Applicant, Language::En);

        assert!(message.text.starts_with("🏠 Main menu\n\n🎓 Guest mode"));
        let keyboard = message.keyboard.unwrap();
        assert_eq!(
            keyboard.payloads(),
            vec!["nav:applicant.admission", "nav:applicant.documents", "act:switch_language"]
        );
    }

    #[test]
    fn test_render_section_has_back_and_home() {
        let registry = MenuRegistry::builtin().unwrap();
        let section = registry.node("student.dorm").unwrap();
        let message = registry.render(section, Role::Student, Language::Ru);

        assert_eq!(message.text, "🏠 Общежитие");
        let keyboard = message.keyboard.unwrap();
        let last = keyboard.rows.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].label, "⬅ Назад");
        assert_eq!(last[0].payload(), Some("nav:student.root"));
        assert_eq!(last[0].style, ButtonStyle::Secondary);
        assert_eq!(last[1].label, "🏠 В меню");
        assert_eq!(last[1].payload(), Some("nav:student.root"));
        assert_eq!(keyboard.rows[0][0].payload(), Some("act:dorm_payment"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let text = r#"
id: student.root
title: { ru: "Дубль" }
children:
  - { id: x.leaf, title: { ru: "x" }, action: faq }
"#;
        let err = with_override(Role::Leadership, text).unwrap_err();
        assert!(matches!(err, MenuError::DuplicateId(id) if id == "student.root"));
    }

    #[test]
    fn test_branch_leaf_violations_rejected() {
        let both = r#"
id: t.root
title: { ru: "x" }
action: faq
children:
  - { id: t.leaf, title: { ru: "y" }, action: faq }
"#;
        assert!(matches!(
            with_override(Role::Student, both).unwrap_err(),
            MenuError::BranchAndLeaf(_)
        ));

        let neither = r#"
id: t.root
title: { ru: "x" }
children:
  - { id: t.empty, title: { ru: "y" } }
"#;
        assert!(matches!(
            with_override(Role::Student, neither).unwrap_err(),
            MenuError::EmptyNode(id) if id == "t.empty"
        ));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let text = r#"
id: t.root
title: { ru: "x" }
children:
  - { id: t.leaf, title: { ru: "y" }, action: launch_rockets }
"#;
        let err = with_override(Role::Student, text).unwrap_err();
        assert!(err.to_string().contains("launch_rockets"));
    }

    #[test]
    fn test_missing_role_rejected() {
        let err = MenuRegistry::from_sources([(Role::Student, BUILTIN_STUDENT)]).unwrap_err();
        assert!(matches!(err, MenuError::MissingRoot(Role::Applicant)));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let err = with_override(Role::Employee, "id: [unclosed").unwrap_err();
        assert!(matches!(err, MenuError::Parse { role: Role::Employee, .. }));
    }

    #[test]
    fn test_load_override_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("leadership.yml"), TINY).unwrap();

        let registry = MenuRegistry::load(Some(dir.path())).unwrap();
        assert_eq!(registry.root(Role::Leadership).unwrap().id, "t.root");
        assert!(registry.node("leadership.news").is_none());
        assert_eq!(registry.root(Role::Student).unwrap().id, "student.root");
    }
}
