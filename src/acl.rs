//! Role × Resource × Action grant table. Pure, no store access: a deny must
//! short-circuit a request before anything touches the database.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Guest,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Photos,
    Albums,
    Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
    Private,
}

/// Returns true if the role may perform the action on the resource.
pub fn allowed(role: Role, _resource: Resource, action: Action) -> bool {
    match role {
        Role::Admin => true,
        // Guests can browse shared content but never mutate it.
        Role::Guest => false,
        Role::Default => matches!(action, Action::Update),
    }
}
