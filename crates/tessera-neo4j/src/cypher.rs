//! Cypher statements issued by the executor.
//!
//! Labels and property keys are always backtick-quoted. Statements that
//! read nodes return their property map under [`NODE`].

/// Alias of node property maps in result rows
pub const NODE: &str = "n";

/// Quote a label or property key.
pub fn quote(name: &str) -> String {
	format!("`{}`", name.replace('`', "``"))
}

pub fn match_by_id(label: &str, id_key: &str) -> String {
	format!(
		"MATCH (n:{} {{{}: $id}}) RETURN properties(n) AS {}",
		quote(label),
		quote(id_key),
		NODE
	)
}

pub fn match_by_ids(label: &str, id_key: &str) -> String {
	format!(
		"MATCH (n:{}) WHERE n.{} IN $ids RETURN properties(n) AS {}",
		quote(label),
		quote(id_key),
		NODE
	)
}

pub fn match_label(label: &str) -> String {
	format!("MATCH (n:{}) RETURN properties(n) AS {}", quote(label), NODE)
}

/// Create or update the node keyed by `$id`, replacing all its properties
/// with `$props`.
pub fn merge(label: &str, id_key: &str) -> String {
	format!(
		"MERGE (n:{} {{{}: $id}}) SET n = $props",
		quote(label),
		quote(id_key)
	)
}

/// Batched [`merge`] over `$rows`, a list of `{id, props}` maps.
pub fn merge_all(label: &str, id_key: &str) -> String {
	format!(
		"UNWIND $rows AS row MERGE (n:{} {{{}: row.id}}) SET n = row.props",
		quote(label),
		quote(id_key)
	)
}

pub fn delete_by_id(label: &str, id_key: &str) -> String {
	format!(
		"MATCH (n:{} {{{}: $id}}) DETACH DELETE n RETURN count(*) AS deleted",
		quote(label),
		quote(id_key)
	)
}

pub fn delete_label(label: &str) -> String {
	format!(
		"MATCH (n:{}) DETACH DELETE n RETURN count(*) AS deleted",
		quote(label)
	)
}

pub fn count_label(label: &str) -> String {
	format!("MATCH (n:{}) RETURN count(n) AS count", quote(label))
}
