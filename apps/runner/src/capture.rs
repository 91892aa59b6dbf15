use hub_core::Node;

/// Custom field a capture node writes to.
///
/// Explicit `variableName` wins; otherwise a prompt asking for a name
/// ("nombre"/"name") stores into `nombre`, and anything else into
/// `captured_<nodeId>`.
pub fn variable_name(node: &Node) -> String {
    if let Some(name) = node.str_field("variableName") {
        return name.trim().to_string();
    }
    let prompt = node
        .str_field("question")
        .unwrap_or_else(|| node.body())
        .to_lowercase();
    if prompt.contains("nombre") || prompt.contains("name") {
        return "nombre".into();
    }
    format!("captured_{}", node.id)
}

const NAME_VARIABLES: [&str; 8] = [
    "nombre",
    "name",
    "nombrecompleto",
    "tunombre",
    "fullname",
    "firstname",
    "primernombre",
    "contactname",
];

/// Whether a captured variable holds the contact's own name.
///
/// Separators and case are ignored (`full_name`, `fullName`, `Nombre`), but
/// other names that merely contain "name" (`username`, `company_name`) do not count.
pub fn is_name_variable(var: &str) -> bool {
    let key: String = var
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect();
    NAME_VARIABLES.contains(&key.as_str())
}

pub const DEFAULT_ERROR_MESSAGE: &str = "Respuesta inválida. Por favor, inténtalo de nuevo.";

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::NodeKind;
    use serde_json::json;

    #[test]
    fn explicit_variable_name_wins() {
        let node = Node::new(
            "c1",
            NodeKind::CaptureInputNode,
            json!({"variableName": "email", "question": "¿Tu nombre?"}),
        );
        assert_eq!(variable_name(&node), "email");
    }

    #[test]
    fn prompt_mentioning_name_defaults_to_nombre() {
        let node = Node::new(
            "c1",
            NodeKind::CaptureInputNode,
            json!({"question": "What is your Name?"}),
        );
        assert_eq!(variable_name(&node), "nombre");
    }

    #[test]
    fn otherwise_keyed_by_node() {
        let node = Node::new("c9", NodeKind::CaptureInputNode, json!({"question": "¿Edad?"}));
        assert_eq!(variable_name(&node), "captured_c9");
        assert!(!is_name_variable("captured_c9"));
        assert!(is_name_variable("full_name"));
    }

    #[test]
    fn only_whole_name_variables_rename_the_contact() {
        for var in ["nombre", "Nombre", "name", "fullName", "nombre_completo", "first-name"] {
            assert!(is_name_variable(var), "{var}");
        }
        for var in ["username", "company_name", "nombre_empresa", "apellido", "nameserver"] {
            assert!(!is_name_variable(var), "{var}");
        }
    }
}
