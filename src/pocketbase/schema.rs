//! Declarative definitions of the backend collections.
//!
//! The backend enforces ownership through these rules; the front-end only
//! mirrors them in its filters. `northlead schema` prints the import JSON.

use serde_json::{json, Value};

pub const LEADS: &str = "leads";
pub const CALL_LOGS: &str = "call_logs";

pub const LEADS_COLLECTION_ID: &str = "leads12345";
pub const CALL_LOGS_COLLECTION_ID: &str = "calllogs01";
pub const USERS_COLLECTION_ID: &str = "_pb_users_auth_";

pub const OWNER_RULE: &str = "owner = @request.auth.id";
pub const OWNER_CREATE_RULE: &str = "@request.auth.id != '' && owner = @request.auth.id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Date,
    Relation {
        collection_id: &'static str,
        cascade_delete: bool,
    },
}

impl FieldKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Date => "date",
            Self::Relation { .. } => "relation",
        }
    }

    fn options(&self) -> Value {
        match self {
            Self::Text => json!({ "min": null, "max": null, "pattern": "" }),
            Self::Email => json!({ "onlyDomains": null }),
            Self::Date => json!({ "min": "", "max": "" }),
            Self::Relation {
                collection_id,
                cascade_delete,
            } => json!({
                "collectionId": collection_id,
                "cascadeDelete": cascade_delete,
                "minSelect": null,
                "maxSelect": 1,
                "displayFields": []
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSchema {
    const fn new(id: &'static str, name: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            id,
            name,
            kind,
            required,
        }
    }
}

/// PocketBase rule semantics: `None` locks the action to superusers,
/// `Some("")` opens it to everyone, anything else is a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    SuperusersOnly,
    Unrestricted,
    Filter(&'static str),
}

impl AccessRule {
    fn to_value(&self) -> Value {
        match self {
            Self::SuperusersOnly => Value::Null,
            Self::Unrestricted => Value::String(String::new()),
            Self::Filter(expr) => Value::String((*expr).to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRules {
    pub list: AccessRule,
    pub view: AccessRule,
    pub create: AccessRule,
    pub update: AccessRule,
    pub delete: AccessRule,
}

impl AccessRules {
    fn owner_scoped() -> Self {
        Self {
            list: AccessRule::Filter(OWNER_RULE),
            view: AccessRule::Filter(OWNER_RULE),
            create: AccessRule::Filter(OWNER_CREATE_RULE),
            update: AccessRule::Filter(OWNER_RULE),
            delete: AccessRule::Filter(OWNER_RULE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub id: &'static str,
    pub name: &'static str,
    pub fields: Vec<FieldSchema>,
    pub rules: AccessRules,
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_import_json(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                json!({
                    "system": false,
                    "id": f.id,
                    "name": f.name,
                    "type": f.kind.type_name(),
                    "required": f.required,
                    "unique": false,
                    "options": f.kind.options(),
                })
            })
            .collect();

        json!({
            "id": self.id,
            "name": self.name,
            "type": "base",
            "system": false,
            "schema": fields,
            "indexes": [],
            "listRule": self.rules.list.to_value(),
            "viewRule": self.rules.view.to_value(),
            "createRule": self.rules.create.to_value(),
            "updateRule": self.rules.update.to_value(),
            "deleteRule": self.rules.delete.to_value(),
            "options": {},
        })
    }
}

fn owner_field(id: &'static str) -> FieldSchema {
    FieldSchema::new(
        id,
        "owner",
        FieldKind::Relation {
            collection_id: USERS_COLLECTION_ID,
            cascade_delete: true,
        },
        true,
    )
}

pub fn leads_collection() -> CollectionSchema {
    CollectionSchema {
        id: LEADS_COLLECTION_ID,
        name: LEADS,
        fields: vec![
            owner_field("ownrrel"),
            FieldSchema::new("compny", "company", FieldKind::Text, true),
            FieldSchema::new("cntname", "contact_name", FieldKind::Text, false),
            FieldSchema::new("tradefld", "trade", FieldKind::Text, false),
            FieldSchema::new("phonefld", "phone", FieldKind::Text, false),
            FieldSchema::new("emailfld", "email", FieldKind::Email, false),
            FieldSchema::new("statusfld", "status", FieldKind::Text, false),
            FieldSchema::new("nextact", "next_action", FieldKind::Date, false),
            FieldSchema::new("lastout", "last_outcome", FieldKind::Text, false),
            FieldSchema::new("notesfld", "notes", FieldKind::Text, false),
        ],
        rules: AccessRules::owner_scoped(),
    }
}

pub fn call_logs_collection() -> CollectionSchema {
    let mut rules = AccessRules::owner_scoped();
    // Left open as deployed; the front-end never updates call logs.
    rules.update = AccessRule::Unrestricted;

    CollectionSchema {
        id: CALL_LOGS_COLLECTION_ID,
        name: CALL_LOGS,
        fields: vec![
            owner_field("ownercl"),
            FieldSchema::new(
                "leadrel",
                "lead",
                FieldKind::Relation {
                    collection_id: LEADS_COLLECTION_ID,
                    cascade_delete: true,
                },
                true,
            ),
            FieldSchema::new("outcome", "outcome", FieldKind::Text, true),
            FieldSchema::new("notescl", "notes", FieldKind::Text, false),
            FieldSchema::new("nextcl", "next_action", FieldKind::Date, false),
        ],
        rules,
    }
}

pub fn collections() -> Vec<CollectionSchema> {
    vec![leads_collection(), call_logs_collection()]
}

/// The array accepted by PocketBase's "Import collections" screen.
pub fn import_json() -> Value {
    Value::Array(collections().iter().map(CollectionSchema::to_import_json).collect())
}
