//! # Owner Index: id → owning class
//!
//! Built once per run over the module arena. Every lookup that used to mean
//! "scan all modules for the class that contains this node" goes through here,
//! so all call sites agree on the answer.

use std::collections::HashMap;

use crate::code::{Class, HttpCall, Module};
use crate::template::Template;
use crate::NodeId;

#[derive(Debug, Default, Clone)]
pub struct OwnerIndex {
    /// class id → (module index, class index)
    classes: HashMap<NodeId, (usize, usize)>,
    /// class name → class id (first registration wins)
    by_name: HashMap<String, NodeId>,
    /// any owned node id → owning class id
    owners: HashMap<NodeId, NodeId>,
}

impl OwnerIndex {
    pub fn build(modules: &[Module], templates: &[Template], calls: &[HttpCall]) -> Self {
        let mut index = OwnerIndex::default();

        for (mi, module) in modules.iter().enumerate() {
            for (ci, class) in module.classes.iter().enumerate() {
                let cid = class.node.id.clone();
                index.classes.insert(cid.clone(), (mi, ci));
                index.by_name.entry(class.name.clone()).or_insert(cid.clone());
                index.owners.insert(cid.clone(), cid.clone());
                for field in &class.fields {
                    index.owners.insert(field.node.id.clone(), cid.clone());
                }
                for method in &class.methods {
                    index.owners.insert(method.node.id.clone(), cid.clone());
                }
            }
        }

        for call in calls {
            if let Some(cid) = call.owner.as_ref().and_then(|n| index.by_name.get(n)).cloned() {
                index.owners.insert(call.node.id.clone(), cid);
            }
        }

        for template in templates {
            let Some(cid) = template
                .controller
                .as_ref()
                .and_then(|n| index.by_name.get(n))
                .cloned()
            else {
                continue;
            };
            index.owners.insert(template.node.id.clone(), cid.clone());
            for directive in &template.directives {
                index.owners.insert(directive.node.id.clone(), cid.clone());
            }
        }

        index
    }

    /// Owning class id of `id`. A class owns itself.
    pub fn owner(&self, id: &NodeId) -> Option<&NodeId> {
        self.owners.get(id)
    }

    pub fn class_named(&self, name: &str) -> Option<&NodeId> {
        self.by_name.get(name)
    }

    pub fn class<'a>(&self, modules: &'a [Module], id: &NodeId) -> Option<&'a Class> {
        let &(mi, ci) = self.classes.get(id)?;
        modules.get(mi)?.classes.get(ci)
    }

    pub fn module_of<'a>(&self, modules: &'a [Module], class_id: &NodeId) -> Option<&'a Module> {
        let &(mi, _) = self.classes.get(class_id)?;
        modules.get(mi)
    }

    /// Owning class of any node, resolved through the arena.
    pub fn owner_class<'a>(&self, modules: &'a [Module], id: &NodeId) -> Option<&'a Class> {
        self.owner(id).and_then(|cid| self.class(modules, cid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CallMethod, ClassFlags, ClassKind, Function};
    use crate::IrNode;
    use std::collections::BTreeSet;

    fn module(path: &str, classes: Vec<Class>) -> Module {
        Module {
            node: IrNode::new(NodeId::new(format!("mod:{}", path))),
            path: path.into(),
            classes,
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    fn class(id: &str, name: &str, kind: ClassKind) -> Class {
        Class {
            node: IrNode::new(NodeId::from(id)),
            name: name.into(),
            kind,
            fields: Vec::new(),
            methods: vec![Function {
                node: IrNode::new(NodeId::new(format!("{}.m", id))),
                name: "load".into(),
                params: Vec::new(),
            }],
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            flags: ClassFlags::empty(),
            watched: Vec::new(),
            di_tokens: Vec::new(),
        }
    }

    #[test]
    fn test_index_resolves_classes_methods_and_calls() {
        let modules = vec![
            module("a.js", vec![class("cls-0001", "UserController", ClassKind::Controller)]),
            module("b.js", vec![class("cls-0002", "AuthService", ClassKind::Service)]),
        ];
        let calls = vec![
            HttpCall {
                node: IrNode::new(NodeId::from("http-0001")),
                method: CallMethod::Get,
                url: "/api/users".into(),
                owner: Some("UserController".into()),
            },
            HttpCall {
                node: IrNode::new(NodeId::from("http-0002")),
                method: CallMethod::Get,
                url: "/api/orphans".into(),
                owner: None,
            },
        ];
        let index = OwnerIndex::build(&modules, &[], &calls);

        assert!(index.class_named("UserController").is_some());
        let owner = index
            .owner_class(&modules, &NodeId::from("http-0001"))
            .unwrap();
        assert_eq!(owner.name, "UserController");
        assert!(index.owner(&NodeId::from("http-0002")).is_none());
        assert_eq!(
            index.owner(&NodeId::from("cls-0002.m")),
            Some(&NodeId::from("cls-0002"))
        );
        assert_eq!(
            index
                .module_of(&modules, &NodeId::from("cls-0002"))
                .unwrap()
                .path,
            "b.js"
        );
    }
}
