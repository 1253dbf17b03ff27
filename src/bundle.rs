//! Representation of a bundle of callables produced by translation.

use indexmap::IndexMap;
use wdl_dx_ir::Type;

/// Represents a declared input or output parameter of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// The name of the parameter.
    name: String,
    /// The declared type of the parameter.
    ty: Type,
}

impl Parameter {
    /// Constructs a new parameter.
    pub fn new(name: impl Into<String>, ty: impl Into<Type>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Gets the name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the declared type of the parameter.
    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// Represents a stage of a workflow: one call of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// The platform stage identifier.
    id: String,
    /// The name of the call in the workflow.
    call: String,
    /// The name of the callable that is called.
    callee: String,
}

impl Stage {
    /// Constructs a new stage.
    pub fn new(id: impl Into<String>, call: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call: call.into(),
            callee: callee.into(),
        }
    }

    /// Gets the stage identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the name of the call.
    pub fn call(&self) -> &str {
        &self.call
    }

    /// Gets the name of the called callable.
    pub fn callee(&self) -> &str {
        &self.callee
    }
}

/// Represents the kind of a callable.
#[derive(Debug, Clone, PartialEq)]
pub enum CallableKind {
    /// The callable is a task (an applet).
    Task,
    /// The callable is a workflow made of stages.
    Workflow(Vec<Stage>),
}

/// Represents a task or workflow with declared parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    /// The name of the callable.
    name: String,
    /// The kind of the callable.
    kind: CallableKind,
    /// The input parameters.
    inputs: Vec<Parameter>,
    /// The output parameters.
    outputs: Vec<Parameter>,
}

impl Callable {
    /// Constructs a new task callable.
    pub fn task(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = Parameter>,
        outputs: impl IntoIterator<Item = Parameter>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CallableKind::Task,
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    /// Constructs a new workflow callable.
    pub fn workflow(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = Parameter>,
        outputs: impl IntoIterator<Item = Parameter>,
        stages: impl IntoIterator<Item = Stage>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: CallableKind::Workflow(stages.into_iter().collect()),
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    /// Gets the name of the callable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the kind of the callable.
    pub fn kind(&self) -> &CallableKind {
        &self.kind
    }

    /// Gets the input parameters of the callable.
    pub fn inputs(&self) -> &[Parameter] {
        &self.inputs
    }

    /// Gets the output parameters of the callable.
    pub fn outputs(&self) -> &[Parameter] {
        &self.outputs
    }

    /// Gets the stages of the callable.
    ///
    /// A task has no stages.
    pub fn stages(&self) -> &[Stage] {
        match &self.kind {
            CallableKind::Task => &[],
            CallableKind::Workflow(stages) => stages,
        }
    }
}

/// Represents the callables produced by translating a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    /// The name of the primary callable, if there is one.
    primary: Option<String>,
    /// The callables of the bundle, by name.
    callables: IndexMap<String, Callable>,
}

impl Bundle {
    /// Constructs a new bundle.
    pub fn new(primary: Option<String>, callables: impl IntoIterator<Item = Callable>) -> Self {
        Self {
            primary,
            callables: callables
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }

    /// Gets the primary callable of the bundle.
    pub fn primary(&self) -> Option<&Callable> {
        self.callables.get(self.primary.as_deref()?)
    }

    /// Gets a callable by name.
    pub fn callable(&self, name: &str) -> Option<&Callable> {
        self.callables.get(name)
    }

    /// Iterates the callables of the bundle.
    pub fn callables(&self) -> impl Iterator<Item = &Callable> {
        self.callables.values()
    }

    /// Gets every fully-qualified input key that may appear in an input
    /// document, along with its declared type.
    ///
    /// Every callable contributes `<callable>.<input>`; every stage of a
    /// workflow additionally contributes `<workflow>.<call>.<input>` for the
    /// inputs of its callee. A key may appear more than once.
    pub fn input_keys(&self) -> Vec<(String, &Type)> {
        let mut keys = Vec::new();
        for callable in self.callables.values() {
            for input in &callable.inputs {
                keys.push((format!("{c}.{i}", c = callable.name, i = input.name), &input.ty));
            }

            for stage in callable.stages() {
                let Some(callee) = self.callables.get(&stage.callee) else {
                    continue;
                };

                for input in &callee.inputs {
                    keys.push((
                        format!(
                            "{c}.{call}.{i}",
                            c = callable.name,
                            call = stage.call,
                            i = input.name
                        ),
                        &input.ty,
                    ));
                }
            }
        }

        keys
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use wdl_dx_ir::PrimitiveType;

    use super::*;

    #[test]
    fn input_keys() {
        let bundle = Bundle::new(Some("wf".to_string()), [
            Callable::task(
                "align",
                [Parameter::new("reads", PrimitiveType::File)],
                [],
            ),
            Callable::workflow(
                "wf",
                [Parameter::new("n", PrimitiveType::Integer)],
                [],
                [Stage::new("stage-1", "align_a", "align")],
            ),
        ]);

        let keys: Vec<_> = bundle
            .input_keys()
            .into_iter()
            .map(|(k, ty)| format!("{k}: {ty}"))
            .collect();
        assert_eq!(keys, [
            "align.reads: File",
            "wf.n: Int",
            "wf.align_a.reads: File"
        ]);
        assert_eq!(bundle.primary().map(Callable::name), Some("wf"));
        assert!(bundle.callable("missing").is_none());
    }
}
