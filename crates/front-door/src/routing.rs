use std::collections::HashMap;

use parking_lot::RwLock;

use registry::RoutingMode;

pub const PROJECT_HEADER: &str = "x-project-id";

/// Per-project routing mode table.
#[derive(Default)]
pub struct RoutingTable {
    modes: RwLock<HashMap<String, RoutingMode>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: &str) -> RoutingMode {
        self.modes
            .read()
            .get(project_id)
            .copied()
            .unwrap_or(RoutingMode::Unconfigured)
    }

    pub fn set(&self, project_id: &str, mode: RoutingMode) {
        self.modes.write().insert(project_id.to_string(), mode);
    }

    pub fn snapshot(&self) -> HashMap<String, RoutingMode> {
        self.modes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.modes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.read().is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectRef {
    pub project_id: String,
    pub from_path: bool,
}

/// Path segment wins over the header, which wins over the subdomain.
pub fn extract_project(path: &str, headers: &HashMap<String, String>) -> Option<ProjectRef> {
    if let Some(segment) = path.split('/').find(|segment| !segment.is_empty()) {
        return Some(ProjectRef {
            project_id: segment.to_string(),
            from_path: true,
        });
    }
    if let Some(project_id) = headers.get(PROJECT_HEADER) {
        if !project_id.is_empty() {
            return Some(ProjectRef {
                project_id: project_id.clone(),
                from_path: false,
            });
        }
    }
    if let Some(host) = headers.get("host") {
        let host = host.split(':').next().unwrap_or_default();
        let mut parts = host.split('.');
        if let Some(subdomain) = parts.next() {
            if parts.next().is_some() && !subdomain.is_empty() && subdomain != "www" {
                return Some(ProjectRef {
                    project_id: subdomain.to_string(),
                    from_path: false,
                });
            }
        }
    }
    None
}

pub fn strip_project(path: &str, project_id: &str) -> String {
    let prefix = format!("/{project_id}");
    match path.strip_prefix(&prefix) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) => rest.to_string(),
        None => path.to_string(),
    }
}
