//! App and type registries.
//!
//! Transport and session layers look up which app handles a data model and
//! how a schema's attributes resolve to ids. Only the lookup surface lives
//! here; [`MemoryRegistry`] is a thread-safe in-process implementation.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::RegistryError;
use crate::model::{DataType, Eid, TagSpec};

/// One attribute of a cell schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDef {
    /// Field name on the typed side, e.g. `"HostAddr"`.
    pub name: String,
    /// Tag expression naming the attribute, e.g. `"host.addr"`.
    pub spec: String,
    pub data_type: DataType,
    /// Resolved attribute id; `NIL` until resolved.
    pub id: Eid,
}

impl AttrDef {
    pub fn new(name: &str, spec: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            spec: spec.to_string(),
            data_type,
            id: Eid::NIL,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_set()
    }
}

/// A resolved cell schema: the data model tag and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrSchema {
    pub schema_id: Eid,
    /// Data model tag, e.g. `"arc.login"`.
    pub model: TagSpec,
    pub attrs: Vec<AttrDef>,
}

impl AttrSchema {
    /// Builds a schema whose id is the data model's tag id.
    pub fn new(model: &str, attrs: Vec<AttrDef>) -> Self {
        let model = TagSpec::parse(model);
        Self {
            schema_id: model.id,
            model,
            attrs,
        }
    }

    /// Finds an attribute by resolved id.
    pub fn attr(&self, id: Eid) -> Option<&AttrDef> {
        self.attrs.iter().find(|a| a.id == id)
    }
}

/// A module registered with the host.
#[derive(Debug, Clone, PartialEq)]
pub struct AppModule {
    /// `"{publisher}/{family}/{app}/v{major}"`, e.g. `"arcspace.systems/amp/filesys/v1"`.
    pub uri: String,
    /// Persistent unique id.
    pub uid: Eid,
    pub desc: String,
    /// `"v{major}.{minor}.{rev}"`
    pub version: String,
    /// Modules this app may access.
    pub dependencies: Vec<Eid>,
    /// Tag expressions of the data models this app handles.
    pub data_models: Vec<String>,
}

/// Resolves attribute definitions and serves schemas.
pub trait TypeRegistry: Send + Sync {
    /// Resolves each def's id from its tag expression and records it.
    ///
    /// Either every def resolves or none is changed.
    fn resolve_and_register(&self, defs: &mut [AttrDef]) -> Result<(), RegistryError>;

    /// Resolves a schema's attributes and makes it available by id.
    ///
    /// A rejected schema records none of its attributes.
    fn register_schema(&self, schema: AttrSchema) -> Result<Arc<AttrSchema>, RegistryError>;

    fn schema_by_id(&self, schema_id: Eid) -> Result<Arc<AttrSchema>, RegistryError>;
}

/// Maps ids, URIs and data models to app modules.
pub trait AppRegistry: Send + Sync {
    fn register_app(&self, app: AppModule) -> Result<(), RegistryError>;

    fn app_by_uid(&self, uid: Eid) -> Result<Arc<AppModule>, RegistryError>;

    fn app_by_uri(&self, uri: &str) -> Result<Arc<AppModule>, RegistryError>;

    /// Selects the app that declares the schema's data model.
    fn app_for_schema(&self, schema: &AttrSchema) -> Result<Arc<AppModule>, RegistryError>;
}

#[derive(Debug, Default)]
struct Apps {
    by_uid: FxHashMap<Eid, Arc<AppModule>>,
    by_uri: FxHashMap<String, Arc<AppModule>>,
    by_model: FxHashMap<Eid, Arc<AppModule>>,
}

#[derive(Debug, Default)]
struct Types {
    attrs: FxHashMap<Eid, AttrDef>,
    schemas: FxHashMap<Eid, Arc<AttrSchema>>,
}

/// In-memory [`AppRegistry`] and [`TypeRegistry`].
///
/// Safe to share between threads; lookups take a read lock.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    apps: RwLock<Apps>,
    types: RwLock<Types>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn resolve(def: &AttrDef) -> Result<Eid, RegistryError> {
    let spec = TagSpec::parse(&def.spec);
    if spec.tags.is_empty() {
        return Err(RegistryError::Unresolved {
            name: def.name.clone(),
            reason: "attr spec has no tag tokens",
        });
    }
    if spec.id.is_sentinel() {
        return Err(RegistryError::Unresolved {
            name: def.name.clone(),
            reason: "attr spec folds to a reserved id",
        });
    }
    Ok(spec.id)
}

impl Types {
    /// Resolves `defs` and checks them against recorded attrs and each other.
    fn check_attrs(&self, defs: &[AttrDef]) -> Result<Vec<Eid>, RegistryError> {
        let ids = defs.iter().map(resolve).collect::<Result<Vec<_>, _>>()?;

        let mut batch: FxHashMap<Eid, DataType> = FxHashMap::default();
        for (def, id) in defs.iter().zip(&ids) {
            let known = self
                .attrs
                .get(id)
                .map(|existing| existing.data_type)
                .or_else(|| batch.get(id).copied());
            if known.is_some_and(|data_type| data_type != def.data_type) {
                return Err(RegistryError::AlreadyRegistered {
                    what: "attr",
                    key: def.spec.clone(),
                });
            }
            batch.insert(*id, def.data_type);
        }
        Ok(ids)
    }

    fn commit_attrs(&mut self, defs: &mut [AttrDef], ids: Vec<Eid>) {
        for (def, id) in defs.iter_mut().zip(ids) {
            def.id = id;
            self.attrs.insert(id, def.clone());
        }
    }
}

impl TypeRegistry for MemoryRegistry {
    fn resolve_and_register(&self, defs: &mut [AttrDef]) -> Result<(), RegistryError> {
        let mut types = self.types.write();
        let ids = types.check_attrs(defs)?;
        types.commit_attrs(defs, ids);
        debug!(count = defs.len(), "registered attr defs");
        Ok(())
    }

    fn register_schema(&self, mut schema: AttrSchema) -> Result<Arc<AttrSchema>, RegistryError> {
        let mut types = self.types.write();
        if types.schemas.contains_key(&schema.schema_id) {
            return Err(RegistryError::AlreadyRegistered {
                what: "schema",
                key: schema.model.canonic.clone(),
            });
        }
        let ids = types.check_attrs(&schema.attrs)?;
        types.commit_attrs(&mut schema.attrs, ids);

        let schema = Arc::new(schema);
        types.schemas.insert(schema.schema_id, schema.clone());
        debug!(
            schema = %schema.model,
            attrs = schema.attrs.len(),
            "registered schema"
        );
        Ok(schema)
    }

    fn schema_by_id(&self, schema_id: Eid) -> Result<Arc<AttrSchema>, RegistryError> {
        self.types
            .read()
            .schemas
            .get(&schema_id)
            .cloned()
            .ok_or(RegistryError::SchemaNotFound { schema_id })
    }
}

impl AppRegistry for MemoryRegistry {
    fn register_app(&self, app: AppModule) -> Result<(), RegistryError> {
        if app.uid.is_sentinel() {
            return Err(RegistryError::Unresolved {
                name: app.uri.clone(),
                reason: "app uid is a reserved id",
            });
        }
        let model_ids: Vec<Eid> = app.data_models.iter().map(|m| TagSpec::parse(m).id).collect();

        let mut apps = self.apps.write();
        if apps.by_uid.contains_key(&app.uid) {
            return Err(RegistryError::AlreadyRegistered {
                what: "app uid",
                key: app.uid.base32(),
            });
        }
        if apps.by_uri.contains_key(&app.uri) {
            return Err(RegistryError::AlreadyRegistered {
                what: "app uri",
                key: app.uri.clone(),
            });
        }

        let app = Arc::new(app);
        apps.by_uid.insert(app.uid, app.clone());
        apps.by_uri.insert(app.uri.clone(), app.clone());
        for id in model_ids {
            // First registration wins for a shared data model.
            apps.by_model.entry(id).or_insert_with(|| app.clone());
        }
        debug!(uri = %app.uri, models = app.data_models.len(), "registered app");
        Ok(())
    }

    fn app_by_uid(&self, uid: Eid) -> Result<Arc<AppModule>, RegistryError> {
        self.apps
            .read()
            .by_uid
            .get(&uid)
            .cloned()
            .ok_or_else(|| RegistryError::AppNotFound { key: uid.base32() })
    }

    fn app_by_uri(&self, uri: &str) -> Result<Arc<AppModule>, RegistryError> {
        self.apps
            .read()
            .by_uri
            .get(uri)
            .cloned()
            .ok_or_else(|| RegistryError::AppNotFound { key: uri.to_string() })
    }

    fn app_for_schema(&self, schema: &AttrSchema) -> Result<Arc<AppModule>, RegistryError> {
        self.apps
            .read()
            .by_model
            .get(&schema.model.id)
            .cloned()
            .ok_or_else(|| RegistryError::AppNotFound {
                key: schema.model.canonic.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filesys_app() -> AppModule {
        AppModule {
            uri: "arcspace.systems/amp/filesys/v1".into(),
            uid: Eid::from_token("filesys"),
            desc: "local files".into(),
            version: "v1.0.0".into(),
            dependencies: vec![],
            data_models: vec!["fs.dir".into(), "fs.file".into()],
        }
    }

    #[test]
    fn test_app_lookups() {
        let reg = MemoryRegistry::new();
        reg.register_app(filesys_app()).unwrap();

        let by_uid = reg.app_by_uid(Eid::from_token("filesys")).unwrap();
        let by_uri = reg.app_by_uri("arcspace.systems/amp/filesys/v1").unwrap();
        assert!(Arc::ptr_eq(&by_uid, &by_uri));

        // Data model match ignores token order.
        let schema = AttrSchema::new("file.fs", vec![]);
        assert_eq!(reg.app_for_schema(&schema).unwrap().uri, by_uri.uri);

        assert!(matches!(
            reg.app_by_uri("nope"),
            Err(RegistryError::AppNotFound { .. })
        ));
        assert!(matches!(
            reg.app_for_schema(&AttrSchema::new("media.image", vec![])),
            Err(RegistryError::AppNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_app() {
        let reg = MemoryRegistry::new();
        reg.register_app(filesys_app()).unwrap();
        assert!(matches!(
            reg.register_app(filesys_app()),
            Err(RegistryError::AlreadyRegistered { what: "app uid", .. })
        ));
    }

    #[test]
    fn test_resolve_and_register() {
        let reg = MemoryRegistry::new();
        let mut defs = vec![
            AttrDef::new("UserTagID", "user.tag", DataType::Text),
            AttrDef::new("HostAddr", "host addr", DataType::Text),
        ];
        reg.resolve_and_register(&mut defs).unwrap();
        assert_eq!(defs[0].id, TagSpec::parse("tag.user").id);
        assert!(defs.iter().all(AttrDef::is_resolved));

        let mut bad = vec![
            AttrDef::new("Ok", "ok", DataType::Bool),
            AttrDef::new("Empty", " . ", DataType::Bool),
        ];
        let err = reg.resolve_and_register(&mut bad).unwrap_err();
        assert!(matches!(err, RegistryError::Unresolved { ref name, .. } if name == "Empty"));
        assert!(!bad[0].is_resolved());

        let mut clash = vec![AttrDef::new("Other", "user.tag", DataType::Int64)];
        assert!(matches!(
            reg.resolve_and_register(&mut clash),
            Err(RegistryError::AlreadyRegistered { what: "attr", .. })
        ));
    }

    #[test]
    fn test_conflict_within_one_batch() {
        let reg = MemoryRegistry::new();
        let mut defs = vec![
            AttrDef::new("First", "x.a", DataType::Text),
            AttrDef::new("Second", "a.x", DataType::Int64),
        ];
        let err = reg.resolve_and_register(&mut defs).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { what: "attr", ref key } if key == "a.x"));
        assert!(defs.iter().all(|d| !d.is_resolved()));

        // Nothing from the failed batch was recorded.
        let mut retry = vec![AttrDef::new("Second", "a.x", DataType::Int64)];
        reg.resolve_and_register(&mut retry).unwrap();

        // Same id and type twice in one batch is fine.
        let mut same = vec![
            AttrDef::new("Left", "p.q", DataType::Bool),
            AttrDef::new("Right", "q.p", DataType::Bool),
        ];
        reg.resolve_and_register(&mut same).unwrap();
        assert_eq!(same[0].id, same[1].id);
    }

    #[test]
    fn test_rejected_schema_records_no_attrs() {
        let reg = MemoryRegistry::new();
        reg.register_schema(AttrSchema::new(
            "m",
            vec![AttrDef::new("A", "y.a", DataType::Text)],
        ))
        .unwrap();

        let dup = AttrSchema::new("m", vec![AttrDef::new("C", "y.c", DataType::Int64)]);
        assert!(matches!(
            reg.register_schema(dup),
            Err(RegistryError::AlreadyRegistered { what: "schema", .. })
        ));

        let mut defs = vec![AttrDef::new("C", "y.c", DataType::Bool)];
        reg.resolve_and_register(&mut defs).unwrap();
        assert!(defs[0].is_resolved());

        // A schema whose attrs clash is rejected whole.
        let clash = AttrSchema::new(
            "n",
            vec![
                AttrDef::new("D", "y.d", DataType::Text),
                AttrDef::new("C", "c.y", DataType::Int64),
            ],
        );
        assert!(reg.register_schema(clash.clone()).is_err());
        assert!(reg.schema_by_id(clash.schema_id).is_err());
        let mut later = vec![AttrDef::new("D", "y.d", DataType::Float64)];
        reg.resolve_and_register(&mut later).unwrap();
    }

    #[test]
    fn test_schema_registration() {
        let reg = MemoryRegistry::new();
        let schema = AttrSchema::new(
            "arc.login",
            vec![AttrDef::new("UserTagID", "user.tag", DataType::Text)],
        );
        let id = schema.schema_id;
        let stored = reg.register_schema(schema.clone()).unwrap();
        assert!(stored.attrs[0].is_resolved());

        let fetched = reg.schema_by_id(id).unwrap();
        assert!(fetched.attr(TagSpec::parse("user.tag").id).is_some());
        assert!(matches!(
            reg.register_schema(schema),
            Err(RegistryError::AlreadyRegistered { what: "schema", .. })
        ));
        assert_eq!(
            reg.schema_by_id(Eid([3, 3, 3])),
            Err(RegistryError::SchemaNotFound { schema_id: Eid([3, 3, 3]) })
        );
    }
}
