//! Tree store: structural queries and node CRUD.
//!
//! The forest is stored flat; every read that needs children derives
//! them from `parent_id` ordered by `(sort_order, id)`.

use super::{now_ms, Database};
use crate::types::{DeletePolicy, NodeId, TaskNode, TaskTree, ORDER_GAP};
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, Row};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

pub(crate) fn parse_node_row(row: &Row) -> rusqlite::Result<TaskNode> {
    Ok(TaskNode {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_id: row.get("parent_id")?,
        sort_order: row.get("sort_order")?,
        title: row.get("title")?,
        completed: row.get::<_, i64>("completed")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Get a node using an existing connection (avoids re-locking).
pub(crate) fn get_node_internal(conn: &Connection, id: &str) -> Result<Option<TaskNode>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;

    match stmt.query_row(params![id], parse_node_row) {
        Ok(node) => Ok(Some(node)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Ordered children of a parent group. `parent` of `None` selects the
/// roots of the project scope.
pub(crate) fn children_internal(
    conn: &Connection,
    project_id: &str,
    parent: Option<&str>,
) -> Result<Vec<TaskNode>> {
    let nodes = match parent {
        Some(pid) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE parent_id = ?1 ORDER BY sort_order, id",
            )?;
            stmt.query_map(params![pid], parse_node_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE project_id = ?1 AND parent_id IS NULL
                 ORDER BY sort_order, id",
            )?;
            stmt.query_map(params![project_id], parse_node_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(nodes)
}

/// True if `candidate` occurs anywhere in the subtree rooted at `root`.
///
/// Iterative with an explicit stack and a visited set, so malformed
/// cyclic rows cannot loop forever.
pub(crate) fn is_descendant_internal(
    conn: &Connection,
    root: &str,
    candidate: &str,
) -> Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = vec![root.to_string()];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }

        let mut stmt = conn.prepare("SELECT id FROM tasks WHERE parent_id = ?1")?;
        let child_ids = stmt
            .query_map(params![&current], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for child in child_ids {
            if child == candidate {
                return Ok(true);
            }
            if !visited.contains(&child) {
                stack.push(child);
            }
        }
    }

    Ok(false)
}

/// Largest sort_order in a sibling group, if the group is non-empty.
pub(crate) fn max_order_internal(
    conn: &Connection,
    project_id: &str,
    parent: Option<&str>,
) -> Result<Option<i64>> {
    let max: Option<i64> = match parent {
        Some(pid) => conn.query_row(
            "SELECT MAX(sort_order) FROM tasks WHERE parent_id = ?1",
            params![pid],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT MAX(sort_order) FROM tasks WHERE project_id = ?1 AND parent_id IS NULL",
            params![project_id],
            |row| row.get(0),
        )?,
    };
    Ok(max)
}

/// Rewrite a sibling group with gap-spaced ranks, preserving order.
pub(crate) fn renumber_group_internal(
    conn: &Connection,
    project_id: &str,
    parent: Option<&str>,
) -> Result<()> {
    let children = children_internal(conn, project_id, parent)?;
    let now = now_ms();
    for (i, child) in children.iter().enumerate() {
        conn.execute(
            "UPDATE tasks SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
            params![(i as i64 + 1) * ORDER_GAP, now, &child.id],
        )?;
    }
    Ok(())
}

impl Database {
    /// Get a single node.
    pub fn get_node(&self, id: &str) -> Result<Option<TaskNode>> {
        self.with_conn(|conn| get_node_internal(conn, id))
    }

    /// Ordered children of a parent group (`None` = project roots).
    pub fn get_children(&self, project_id: &str, parent: Option<&str>) -> Result<Vec<TaskNode>> {
        self.with_conn(|conn| children_internal(conn, project_id, parent))
    }

    /// True if `candidate` is anywhere in the subtree rooted at `root`.
    pub fn is_descendant(&self, root: &str, candidate: &str) -> Result<bool> {
        self.with_conn(|conn| is_descendant_internal(conn, root, candidate))
    }

    /// Create a node, appended last among its siblings.
    /// If `id` is not provided a UUIDv7 is generated.
    pub fn create_node(
        &self,
        id: Option<NodeId>,
        project_id: &str,
        parent_id: Option<&str>,
        title: &str,
    ) -> Result<TaskNode> {
        let node_id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        self.with_conn(|conn| {
            if let Some(pid) = parent_id {
                let parent = get_node_internal(conn, pid)?
                    .ok_or_else(|| anyhow!("Parent not found: {}", pid))?;
                if parent.project_id != project_id {
                    return Err(anyhow!(
                        "Parent {} belongs to project {}, not {}",
                        pid,
                        parent.project_id,
                        project_id
                    ));
                }
            }

            let order = max_order_internal(conn, project_id, parent_id)?
                .map_or(ORDER_GAP, |max| max.saturating_add(ORDER_GAP));

            conn.execute(
                "INSERT INTO tasks (id, project_id, parent_id, sort_order, title, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                params![&node_id, project_id, parent_id, order, title, now, now],
            )?;

            get_node_internal(conn, &node_id)?
                .ok_or_else(|| anyhow!("Node vanished after insert: {}", node_id))
        })
    }

    /// The full forest for a project as nested trees, root group first,
    /// every sibling group ordered by `(sort_order, id)`.
    pub fn get_project_tree(&self, project_id: &str) -> Result<Vec<TaskTree>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE project_id = ?1 ORDER BY sort_order, id",
            )?;
            let nodes = stmt
                .query_map(params![project_id], parse_node_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut by_parent: HashMap<Option<NodeId>, Vec<TaskNode>> = HashMap::new();
            for node in nodes {
                by_parent.entry(node.parent_id.clone()).or_default().push(node);
            }

            fn build(
                parent: &Option<NodeId>,
                by_parent: &HashMap<Option<NodeId>, Vec<TaskNode>>,
                seen: &mut HashSet<NodeId>,
            ) -> Vec<TaskTree> {
                let Some(children) = by_parent.get(parent) else {
                    return Vec::new();
                };
                let mut out = Vec::with_capacity(children.len());
                for c in children {
                    // seen-guard keeps malformed cyclic rows from recursing forever
                    if !seen.insert(c.id.clone()) {
                        continue;
                    }
                    out.push(TaskTree {
                        node: c.clone(),
                        children: build(&Some(c.id.clone()), by_parent, seen),
                    });
                }
                out
            }

            let mut seen = HashSet::new();
            Ok(build(&None, &by_parent, &mut seen))
        })
    }

    /// Rename a node. Returns the updated node.
    pub fn rename_node(&self, id: &str, title: &str) -> Result<TaskNode> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now_ms(), id],
            )?;
            if updated == 0 {
                return Err(anyhow!("Node not found: {}", id));
            }
            get_node_internal(conn, id)?.ok_or_else(|| anyhow!("Node not found: {}", id))
        })
    }

    /// Set the completion flag. Returns the updated node.
    pub fn set_completed(&self, id: &str, completed: bool) -> Result<TaskNode> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET completed = ?1, updated_at = ?2 WHERE id = ?3",
                params![completed as i64, now_ms(), id],
            )?;
            if updated == 0 {
                return Err(anyhow!("Node not found: {}", id));
            }
            get_node_internal(conn, id)?.ok_or_else(|| anyhow!("Node not found: {}", id))
        })
    }

    /// Delete a node. Descendant handling follows `policy`: cascade
    /// removes the whole subtree, promote reparents children to the
    /// deleted node's parent keeping their relative order.
    /// Returns the number of deleted nodes.
    pub fn delete_node(&self, id: &str, policy: DeletePolicy) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let node = get_node_internal(&tx, id)?
                .ok_or_else(|| anyhow!("Node not found: {}", id))?;

            let deleted = match policy {
                DeletePolicy::Cascade => {
                    // Collect the subtree iteratively, then delete
                    // leaves-first so the parent_id reference holds.
                    let mut ordered: Vec<String> = Vec::new();
                    let mut visited: HashSet<String> = HashSet::new();
                    let mut stack = vec![id.to_string()];
                    while let Some(current) = stack.pop() {
                        if !visited.insert(current.clone()) {
                            continue;
                        }
                        ordered.push(current.clone());
                        let mut stmt =
                            tx.prepare("SELECT id FROM tasks WHERE parent_id = ?1")?;
                        let child_ids = stmt
                            .query_map(params![&current], |row| row.get::<_, String>(0))?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        stack.extend(child_ids);
                    }
                    for nid in ordered.iter().rev() {
                        tx.execute("DELETE FROM tasks WHERE id = ?1", params![nid])?;
                    }
                    ordered.len()
                }
                DeletePolicy::Promote => {
                    let now = now_ms();
                    tx.execute(
                        "UPDATE tasks SET parent_id = ?1, updated_at = ?2 WHERE parent_id = ?3",
                        params![&node.parent_id, now, id],
                    )?;
                    tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
                    // Promoted children may collide with existing
                    // sibling ranks; renumber the merged group.
                    renumber_group_internal(&tx, &node.project_id, node.parent_id.as_deref())?;
                    1
                }
            };

            tx.commit()?;
            info!(node = id, ?policy, deleted, "deleted node");
            Ok(deleted)
        })
    }
}
