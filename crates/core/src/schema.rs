//! Space system declarations and the compiled schema index.
//!
//! The loader produces a [`SpaceSystem`] tree whose references are
//! plain strings, exactly as written in the document. [`Schema::build`]
//! flattens that tree once: every name becomes a fully qualified
//! `/Root/Sub/Name` path, every reference is resolved to a dense
//! index, base-container cycles and dangling references are rejected,
//! comparisons are validated against their parameter types, and each
//! container's root-first inheritance chain and child list are
//! precomputed. After build the schema is immutable and shareable
//! across threads.
//!
//! Reference resolution order: a reference starting with `/` is
//! absolute; otherwise it is tried against the declaring system, then
//! each ancestor system up to the root.

use std::collections::HashMap;

use crate::compare::{Comparison, ComparisonOperator};
use crate::container::{Container, ContainerEntry, EntryLocation};
use crate::error::{Result, SchemaError};
use crate::types::ParameterType;

/// A named parameter/argument type declaration.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    /// Engineering unit, kept as opaque metadata
    pub unit: Option<String>,
    pub kind: ParameterType,
}

/// A parameter declaration: a name bound to a type reference.
#[derive(Debug, Clone)]
pub struct ParameterDecl {
    pub name: String,
    pub type_ref: String,
}

/// One comparison as written in the document (unresolved reference).
#[derive(Debug, Clone)]
pub struct ComparisonDecl {
    pub parameter_ref: String,
    pub operator: ComparisonOperator,
    pub value: String,
    pub use_calibrated: bool,
}

/// One container entry as written in the document.
#[derive(Debug, Clone)]
pub enum EntryDecl {
    Parameter {
        parameter_ref: String,
        location: Option<EntryLocation>,
    },
    Argument {
        argument_ref: String,
    },
    Container {
        container_ref: String,
        condition: Vec<ComparisonDecl>,
    },
    FixedValue {
        size_in_bits: u32,
        bytes: Vec<u8>,
    },
}

/// A sequence or command container declaration.
#[derive(Debug, Clone)]
pub struct ContainerDecl {
    pub name: String,
    pub is_abstract: bool,
    pub base_ref: Option<String>,
    pub restriction: Vec<ComparisonDecl>,
    pub entries: Vec<EntryDecl>,
}

/// An argument declaration inside a meta-command.
#[derive(Debug, Clone)]
pub struct ArgumentDecl {
    pub name: String,
    pub type_ref: String,
}

/// A meta-command declaration.
#[derive(Debug, Clone)]
pub struct MetaCommandDecl {
    pub name: String,
    pub is_abstract: bool,
    pub base_ref: Option<String>,
    pub arguments: Vec<ArgumentDecl>,
    pub container: Option<ContainerDecl>,
}

/// One namespace node of an XTCE document, as loaded.
#[derive(Debug, Clone, Default)]
pub struct SpaceSystem {
    pub name: String,
    /// Opaque header text, when the document carries one
    pub header: Option<String>,
    pub parameter_types: Vec<TypeDecl>,
    pub argument_types: Vec<TypeDecl>,
    pub parameters: Vec<ParameterDecl>,
    pub containers: Vec<ContainerDecl>,
    pub meta_commands: Vec<MetaCommandDecl>,
    pub children: Vec<SpaceSystem>,
}

impl SpaceSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A resolved named type.
#[derive(Debug, Clone)]
pub struct NamedType {
    pub qualified_name: String,
    pub unit: Option<String>,
    pub kind: ParameterType,
}

/// A resolved parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub qualified_name: String,
    pub type_idx: usize,
}

/// A resolved command argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub type_idx: usize,
}

/// A resolved meta-command.
#[derive(Debug, Clone)]
pub struct MetaCommand {
    pub qualified_name: String,
    pub is_abstract: bool,
    pub base: Option<usize>,
    pub arguments: Vec<Argument>,
    /// This command's own container, when it declares one
    pub container: Option<usize>,
}

/// The compiled, immutable schema index.
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<NamedType>,
    parameters: Vec<Parameter>,
    containers: Vec<Container>,
    commands: Vec<MetaCommand>,
    type_index: HashMap<String, usize>,
    parameter_index: HashMap<String, usize>,
    container_index: HashMap<String, usize>,
    command_index: HashMap<String, usize>,
    /// Root-first inheritance chain (including self) per container
    chains: Vec<Vec<usize>>,
    /// Direct children per container, in declaration order
    children: Vec<Vec<usize>>,
}

/// Flattened declarations tagged with their system path.
#[derive(Default)]
struct Flattened {
    types: Vec<(String, TypeDecl)>,
    parameters: Vec<(String, ParameterDecl)>,
    containers: Vec<(String, ContainerDecl)>,
    /// (path, decl, qualified name of own container if any)
    commands: Vec<(String, MetaCommandDecl, Option<String>)>,
}

impl Schema {
    /// Compile a space system tree into a validated schema.
    pub fn build(root: SpaceSystem) -> Result<Schema> {
        let mut flat = Flattened::default();
        flatten(root, "", &mut flat)?;

        let type_index = index_names(flat.types.iter().map(|(p, d)| qualify(p, &d.name)))?;
        let parameter_index =
            index_names(flat.parameters.iter().map(|(p, d)| qualify(p, &d.name)))?;
        let container_index =
            index_names(flat.containers.iter().map(|(p, d)| qualify(p, &d.name)))?;
        let command_index =
            index_names(flat.commands.iter().map(|(p, d, _)| qualify(p, &d.name)))?;

        let parameter_qnames: Vec<String> = flat
            .parameters
            .iter()
            .map(|(p, d)| qualify(p, &d.name))
            .collect();
        let type_qnames: Vec<String> =
            flat.types.iter().map(|(p, d)| qualify(p, &d.name)).collect();

        // Types first: their internal references (dynamic sizes,
        // array elements) must point at qualified names before any
        // decode touches them.
        let mut types = Vec::with_capacity(flat.types.len());
        for (path, decl) in flat.types {
            let mut kind = decl.kind;
            qualify_type_refs(
                &mut kind,
                &path,
                &parameter_index,
                &parameter_qnames,
                &type_index,
                &type_qnames,
            )?;
            types.push(NamedType {
                qualified_name: qualify(&path, &decl.name),
                unit: decl.unit,
                kind,
            });
        }

        let mut parameters = Vec::with_capacity(flat.parameters.len());
        for (path, decl) in &flat.parameters {
            let type_idx = resolve(&type_index, path, &decl.type_ref)
                .ok_or_else(|| SchemaError::UnknownType(decl.type_ref.clone()))?;
            parameters.push(Parameter {
                qualified_name: qualify(path, &decl.name),
                type_idx,
            });
        }

        let mut containers = Vec::with_capacity(flat.containers.len());
        for (path, decl) in flat.containers {
            containers.push(resolve_container_decl(
                &path,
                decl,
                &container_index,
                &parameter_index,
                &parameter_qnames,
            )?);
        }

        let mut commands = Vec::with_capacity(flat.commands.len());
        for (path, decl, container_qname) in &flat.commands {
            let base = match &decl.base_ref {
                Some(r) => Some(
                    resolve(&command_index, path, r)
                        .ok_or_else(|| SchemaError::UnknownCommand(r.clone()))?,
                ),
                None => None,
            };
            let mut arguments = Vec::with_capacity(decl.arguments.len());
            for arg in &decl.arguments {
                let type_idx = resolve(&type_index, path, &arg.type_ref)
                    .ok_or_else(|| SchemaError::UnknownType(arg.type_ref.clone()))?;
                arguments.push(Argument {
                    name: arg.name.clone(),
                    type_idx,
                });
            }
            let container = container_qname
                .as_ref()
                .map(|q| container_index[q.as_str()]);
            commands.push(MetaCommand {
                qualified_name: qualify(path, &decl.name),
                is_abstract: decl.is_abstract,
                base,
                arguments,
                container,
            });
        }

        let mut schema = Schema {
            chains: Vec::new(),
            children: Vec::new(),
            types,
            parameters,
            containers,
            commands,
            type_index,
            parameter_index,
            container_index,
            command_index,
        };
        schema.detect_cycles()?;
        schema.precompute_topology();
        schema.validate_comparisons()?;
        Ok(schema)
    }

    /// An empty schema (no names resolve). Mostly useful in tests.
    pub fn empty() -> Schema {
        Schema {
            types: Vec::new(),
            parameters: Vec::new(),
            containers: Vec::new(),
            commands: Vec::new(),
            type_index: HashMap::new(),
            parameter_index: HashMap::new(),
            container_index: HashMap::new(),
            command_index: HashMap::new(),
            chains: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn container(&self, idx: usize) -> &Container {
        &self.containers[idx]
    }

    pub(crate) fn parameter(&self, idx: usize) -> &Parameter {
        &self.parameters[idx]
    }

    pub(crate) fn type_at(&self, idx: usize) -> &ParameterType {
        &self.types[idx].kind
    }

    /// Root-first inheritance chain of a container, including itself.
    pub(crate) fn chain(&self, idx: usize) -> &[usize] {
        &self.chains[idx]
    }

    /// Direct inheritors of a container, in declaration order.
    pub(crate) fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Type of a parameter, by the parameter's qualified name.
    pub fn parameter_type_of(&self, parameter: &str) -> Option<&ParameterType> {
        self.parameter_index
            .get(parameter)
            .map(|&p| &self.types[self.parameters[p].type_idx].kind)
    }

    /// Type by its own qualified name.
    pub fn parameter_type(&self, qualified_name: &str) -> Option<&ParameterType> {
        self.type_index
            .get(qualified_name)
            .map(|&t| &self.types[t].kind)
    }

    /// All containers, in declaration order.
    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(|c| c.qualified_name.as_str())
    }

    /// All parameters, in declaration order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.qualified_name.as_str())
    }

    /// All meta-commands, in declaration order.
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.qualified_name.as_str())
    }

    /// Resolve a container by qualified name, or by unique simple name.
    pub fn resolve_container(&self, name: &str) -> Result<usize> {
        resolve_public(&self.container_index, name)
            .map_err(|e| match e {
                None => SchemaError::UnknownContainer(name.to_string()).into(),
                Some(candidates) => SchemaError::AmbiguousName {
                    name: name.to_string(),
                    candidates,
                }
                .into(),
            })
    }

    /// Resolve a meta-command by qualified name, or by unique simple
    /// name.
    pub fn resolve_command(&self, name: &str) -> Result<usize> {
        resolve_public(&self.command_index, name)
            .map_err(|e| match e {
                None => SchemaError::UnknownCommand(name.to_string()).into(),
                Some(candidates) => SchemaError::AmbiguousName {
                    name: name.to_string(),
                    candidates,
                }
                .into(),
            })
    }

    /// Argument name -> type index over a command's base chain
    /// (nearest declaration wins).
    pub(crate) fn command_arguments(&self, command: usize) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        let mut cursor = Some(command);
        while let Some(idx) = cursor {
            let cmd = &self.commands[idx];
            for arg in &cmd.arguments {
                index.entry(arg.name.clone()).or_insert(arg.type_idx);
            }
            cursor = cmd.base;
        }
        index
    }

    /// The container a command encodes into: its own, or the nearest
    /// ancestor command's.
    pub(crate) fn command_container(&self, command: usize) -> Result<usize> {
        let mut cursor = Some(command);
        while let Some(idx) = cursor {
            let cmd = &self.commands[idx];
            if let Some(container) = cmd.container {
                return Ok(container);
            }
            cursor = cmd.base;
        }
        Err(SchemaError::CommandWithoutContainer(
            self.commands[command].qualified_name.clone(),
        )
        .into())
    }

    fn detect_cycles(&self) -> Result<()> {
        for start in 0..self.containers.len() {
            let mut seen = vec![start];
            let mut cursor = self.containers[start].base;
            while let Some(idx) = cursor {
                if seen.contains(&idx) {
                    return Err(SchemaError::CyclicInheritance(
                        self.containers[start].qualified_name.clone(),
                    )
                    .into());
                }
                seen.push(idx);
                cursor = self.containers[idx].base;
            }
        }
        for start in 0..self.commands.len() {
            let mut seen = vec![start];
            let mut cursor = self.commands[start].base;
            while let Some(idx) = cursor {
                if seen.contains(&idx) {
                    return Err(SchemaError::CyclicInheritance(
                        self.commands[start].qualified_name.clone(),
                    )
                    .into());
                }
                seen.push(idx);
                cursor = self.commands[idx].base;
            }
        }
        Ok(())
    }

    fn precompute_topology(&mut self) {
        let n = self.containers.len();
        let mut chains = Vec::with_capacity(n);
        let mut children = vec![Vec::new(); n];
        for idx in 0..n {
            let mut chain = vec![idx];
            let mut cursor = self.containers[idx].base;
            while let Some(base) = cursor {
                chain.push(base);
                cursor = self.containers[base].base;
            }
            chain.reverse();
            chains.push(chain);
            if let Some(base) = self.containers[idx].base {
                children[base].push(idx);
            }
        }
        self.chains = chains;
        self.children = children;
    }

    fn validate_comparisons(&self) -> Result<()> {
        let validate_list = |comparisons: &[Comparison]| -> Result<()> {
            for comparison in comparisons {
                let ty = self
                    .parameter_type_of(&comparison.parameter)
                    .ok_or_else(|| {
                        SchemaError::UnknownParameter(comparison.parameter.clone())
                    })?;
                comparison.validate(ty)?;
            }
            Ok(())
        };
        for container in &self.containers {
            validate_list(&container.restriction)?;
            for entry in &container.entries {
                if let ContainerEntry::ContainerRef { condition, .. } = entry {
                    validate_list(condition)?;
                }
            }
        }
        Ok(())
    }
}

/// Walk the declaration tree depth-first, collecting decls under
/// their system path.
fn flatten(system: SpaceSystem, parent_path: &str, out: &mut Flattened) -> Result<()> {
    let path = format!("{parent_path}/{}", system.name);

    for decl in system.parameter_types {
        out.types.push((path.clone(), decl));
    }
    for decl in system.argument_types {
        out.types.push((path.clone(), decl));
    }
    for decl in system.parameters {
        out.parameters.push((path.clone(), decl));
    }
    for decl in system.containers {
        out.containers.push((path.clone(), decl));
    }
    for mut decl in system.meta_commands {
        let container_qname = match decl.container.take() {
            Some(container) => {
                let qname = qualify(&path, &container.name);
                out.containers.push((path.clone(), container));
                Some(qname)
            }
            None => None,
        };
        out.commands.push((path.clone(), decl, container_qname));
    }
    for child in system.children {
        flatten(child, &path, out)?;
    }
    Ok(())
}

fn qualify(path: &str, name: &str) -> String {
    format!("{path}/{name}")
}

/// Build a name index, rejecting duplicates.
fn index_names(names: impl Iterator<Item = String>) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (i, name) in names.enumerate() {
        if index.insert(name.clone(), i).is_some() {
            return Err(SchemaError::DuplicateName(name).into());
        }
    }
    Ok(index)
}

/// Resolve a document reference against an index: absolute when it
/// starts with `/`, otherwise sibling-first with ancestor fallback.
fn resolve(index: &HashMap<String, usize>, scope_path: &str, reference: &str) -> Option<usize> {
    if reference.starts_with('/') {
        return index.get(reference).copied();
    }
    let mut scope = scope_path;
    loop {
        let candidate = format!("{scope}/{reference}");
        if let Some(&idx) = index.get(&candidate) {
            return Some(idx);
        }
        match scope.rfind('/') {
            Some(pos) if pos > 0 => scope = &scope[..pos],
            _ => return None,
        }
    }
}

/// Public-API resolution: exact qualified name, or unique simple name.
/// `Err(None)` means not found, `Err(Some(candidates))` means ambiguous.
fn resolve_public(
    index: &HashMap<String, usize>,
    name: &str,
) -> std::result::Result<usize, Option<Vec<String>>> {
    if let Some(&idx) = index.get(name) {
        return Ok(idx);
    }
    if name.starts_with('/') {
        return Err(None);
    }
    let suffix = format!("/{name}");
    let mut matches: Vec<(&String, usize)> = index
        .iter()
        .filter(|(qname, _)| qname.ends_with(&suffix))
        .map(|(qname, &idx)| (qname, idx))
        .collect();
    match matches.len() {
        0 => Err(None),
        1 => Ok(matches.pop().unwrap().1),
        _ => {
            let mut candidates: Vec<String> =
                matches.into_iter().map(|(q, _)| q.clone()).collect();
            candidates.sort();
            Err(Some(candidates))
        }
    }
}

fn resolve_comparisons(
    decls: &[ComparisonDecl],
    path: &str,
    parameter_index: &HashMap<String, usize>,
    parameter_qnames: &[String],
) -> Result<Vec<Comparison>> {
    decls
        .iter()
        .map(|decl| {
            let idx = resolve(parameter_index, path, &decl.parameter_ref)
                .ok_or_else(|| SchemaError::UnknownParameter(decl.parameter_ref.clone()))?;
            Ok(Comparison {
                parameter: parameter_qnames[idx].clone(),
                operator: decl.operator,
                value: decl.value.clone(),
                use_calibrated: decl.use_calibrated,
            })
        })
        .collect()
}

fn resolve_container_decl(
    path: &str,
    decl: ContainerDecl,
    container_index: &HashMap<String, usize>,
    parameter_index: &HashMap<String, usize>,
    parameter_qnames: &[String],
) -> Result<Container> {
    let base = match &decl.base_ref {
        Some(r) => Some(
            resolve(container_index, path, r)
                .ok_or_else(|| SchemaError::UnknownContainer(r.clone()))?,
        ),
        None => None,
    };
    let restriction =
        resolve_comparisons(&decl.restriction, path, parameter_index, parameter_qnames)?;
    let mut entries = Vec::with_capacity(decl.entries.len());
    for entry in decl.entries {
        entries.push(match entry {
            EntryDecl::Parameter {
                parameter_ref,
                location,
            } => ContainerEntry::Parameter {
                parameter: resolve(parameter_index, path, &parameter_ref)
                    .ok_or_else(|| SchemaError::UnknownParameter(parameter_ref.clone()))?,
                location,
            },
            EntryDecl::Argument { argument_ref } => ContainerEntry::Argument { name: argument_ref },
            EntryDecl::Container {
                container_ref,
                condition,
            } => ContainerEntry::ContainerRef {
                container: resolve(container_index, path, &container_ref)
                    .ok_or_else(|| SchemaError::UnknownContainer(container_ref.clone()))?,
                condition: resolve_comparisons(
                    &condition,
                    path,
                    parameter_index,
                    parameter_qnames,
                )?,
            },
            EntryDecl::FixedValue {
                size_in_bits,
                bytes,
            } => ContainerEntry::FixedValue {
                size_in_bits,
                bytes: normalize_fixed_value(bytes, size_in_bits),
            },
        });
    }
    Ok(Container {
        qualified_name: qualify(path, &decl.name),
        is_abstract: decl.is_abstract,
        base,
        restriction,
        entries,
    })
}

/// Normalize a fixed-value pattern to exactly `size_in_bits` of
/// right-aligned payload, so the decode-time comparison is a plain
/// equality on the bit run.
fn normalize_fixed_value(bytes: Vec<u8>, size_in_bits: u32) -> Vec<u8> {
    let n = size_in_bits as usize;
    let needed = (n + 7) / 8;
    let mut out = vec![0u8; needed];
    // Copy the low `needed` bytes, right-aligned
    let src_start = bytes.len().saturating_sub(needed);
    let dst_start = needed.saturating_sub(bytes.len() - src_start);
    out[dst_start..].copy_from_slice(&bytes[src_start..]);
    // Mask partial lead bits
    let lead = n % 8;
    if lead != 0 {
        out[0] &= (1u16 << lead) as u8 - 1;
    }
    out
}

/// Rewrite the string references inside a type to qualified names.
fn qualify_type_refs(
    kind: &mut ParameterType,
    path: &str,
    parameter_index: &HashMap<String, usize>,
    parameter_qnames: &[String],
    type_index: &HashMap<String, usize>,
    type_qnames: &[String],
) -> Result<()> {
    use crate::encoding::{BinarySizing, DataEncoding, StringSizing};
    use crate::types::ArrayDimension;

    let qualify_param = |reference: &mut String| -> Result<()> {
        let idx = resolve(parameter_index, path, reference)
            .ok_or_else(|| SchemaError::UnknownParameter(reference.clone()))?;
        *reference = parameter_qnames[idx].clone();
        Ok(())
    };

    match kind {
        ParameterType::String { encoding } => {
            if let StringSizing::Dynamic { size_ref, .. } = &mut encoding.sizing {
                qualify_param(size_ref)?;
            }
        }
        ParameterType::Binary { encoding } => {
            if let BinarySizing::Dynamic { size_ref } = &mut encoding.sizing {
                qualify_param(size_ref)?;
            }
        }
        ParameterType::Float { encoding, .. } => {
            if let DataEncoding::String(enc) = encoding {
                if let StringSizing::Dynamic { size_ref, .. } = &mut enc.sizing {
                    qualify_param(size_ref)?;
                }
            }
        }
        ParameterType::Array {
            element_type_ref,
            dimension,
        } => {
            let idx = resolve(type_index, path, element_type_ref)
                .ok_or_else(|| SchemaError::UnknownType(element_type_ref.clone()))?;
            *element_type_ref = type_qnames[idx].clone();
            if let ArrayDimension::Parameter(reference) = dimension {
                qualify_param(reference)?;
            }
        }
        _ => {}
    }
    Ok(())
}
