//! Method - routed method の定義と型消去
//!
//! # 二層構造
//! - **表層（Typed）**: `Method::bare` / `Method::contextual` / `Method::with_args::<A>`
//!   クロージャの型から引数の shape が決まる
//! - **内部（Dyn）**: `DynMethod` trait - object-safe。宣言された `Signature` を公開し、
//!   bind 時に shape check される
//!
//! reflection の代わりに、各 method が自分の引数リストを宣言する。
//! `DynMethod` を直接実装すれば任意の signature を宣言できるので、
//! bind 時の検査は実際に意味を持つ。

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::arguments::MethodArguments;
use crate::domain::{BindError, Outcome, ParamKind, TaskError, TaskName};
use crate::runtime::context::TaskContext;

/// method が受け取る引数の形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodShape {
    /// `()`
    Bare,
    /// `(context)`
    Contextual,
    /// `(worker arguments, context)`
    WithArgs,
}

impl MethodShape {
    /// この shape で渡される引数の並び
    pub fn expected(&self) -> &'static [ParamKind] {
        match self {
            MethodShape::Bare => &[],
            MethodShape::Contextual => &[ParamKind::Context],
            MethodShape::WithArgs => &[ParamKind::Arguments, ParamKind::Context],
        }
    }
}

/// 宣言された 1 つの引数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    kind: ParamKind,
    type_id: TypeId,
    type_name: &'static str,
}

impl Param {
    pub fn arguments<A: Any>() -> Self {
        Self {
            kind: ParamKind::Arguments,
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
        }
    }

    pub fn context() -> Self {
        Self::of::<TaskContext<'static>>(ParamKind::Context)
    }

    /// 任意の型で宣言する（`DynMethod` を手で実装する場合）
    pub fn of<T: Any>(kind: ParamKind) -> Self {
        Self {
            kind,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// method の宣言された引数リスト
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// DynMethod は object-safe な routed method
pub trait DynMethod: Send + Sync {
    fn shape(&self) -> MethodShape;

    fn signature(&self) -> Signature;

    /// `args` は shape が `WithArgs` の時だけ渡される
    fn call(
        &self,
        args: Option<&MethodArguments>,
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome, TaskError>;
}

struct BareFn<F>(F);

impl<F> DynMethod for BareFn<F>
where
    F: Fn() -> Result<Outcome, TaskError> + Send + Sync,
{
    fn shape(&self) -> MethodShape {
        MethodShape::Bare
    }

    fn signature(&self) -> Signature {
        Signature::default()
    }

    fn call(&self, _: Option<&MethodArguments>, _: &TaskContext<'_>) -> Result<Outcome, TaskError> {
        (self.0)()
    }
}

struct ContextFn<F>(F);

impl<F> DynMethod for ContextFn<F>
where
    F: Fn(&TaskContext<'_>) -> Result<Outcome, TaskError> + Send + Sync,
{
    fn shape(&self) -> MethodShape {
        MethodShape::Contextual
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![Param::context()])
    }

    fn call(
        &self,
        _: Option<&MethodArguments>,
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome, TaskError> {
        (self.0)(ctx)
    }
}

struct ArgsFn<A, F> {
    f: F,
    _marker: PhantomData<fn(&A)>,
}

impl<A, F> DynMethod for ArgsFn<A, F>
where
    A: Any + Send + Sync,
    F: Fn(&A, &TaskContext<'_>) -> Result<Outcome, TaskError> + Send + Sync,
{
    fn shape(&self) -> MethodShape {
        MethodShape::WithArgs
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![Param::arguments::<A>(), Param::context()])
    }

    fn call(
        &self,
        args: Option<&MethodArguments>,
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome, TaskError> {
        let args = args.and_then(|a| a.downcast_ref::<A>()).ok_or_else(|| {
            TaskError::new(format!("arguments are not of {}", std::any::type_name::<A>()))
        })?;
        (self.f)(args, ctx)
    }
}

/// 名前付きの routed method
#[derive(Clone)]
pub struct Method {
    name: TaskName,
    inner: Arc<dyn DynMethod>,
}

impl Method {
    pub fn bare<F>(name: impl Into<TaskName>, f: F) -> Self
    where
        F: Fn() -> Result<Outcome, TaskError> + Send + Sync + 'static,
    {
        Self::from_dyn(name, Arc::new(BareFn(f)))
    }

    pub fn contextual<F>(name: impl Into<TaskName>, f: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> Result<Outcome, TaskError> + Send + Sync + 'static,
    {
        Self::from_dyn(name, Arc::new(ContextFn(f)))
    }

    pub fn with_args<A, F>(name: impl Into<TaskName>, f: F) -> Self
    where
        A: Any + Send + Sync,
        F: Fn(&A, &TaskContext<'_>) -> Result<Outcome, TaskError> + Send + Sync + 'static,
    {
        Self::from_dyn(
            name,
            Arc::new(ArgsFn {
                f,
                _marker: PhantomData,
            }),
        )
    }

    pub fn from_dyn(name: impl Into<TaskName>, inner: Arc<dyn DynMethod>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn shape(&self) -> MethodShape {
        self.inner.shape()
    }

    pub fn signature(&self) -> Signature {
        self.inner.signature()
    }

    /// bind 時の shape check
    ///
    /// 1. 宣言された引数の数が shape と一致するか
    /// 2. 各引数の種類と型が、実際に渡されるものと互換か
    pub fn check_binding(&self, args: Option<&MethodArguments>) -> Result<(), BindError> {
        let expected = self.inner.shape().expected();
        let signature = self.inner.signature();

        if signature.len() != expected.len() {
            return Err(BindError::ParameterCount {
                method: self.name.clone(),
                expected: expected.len(),
                actual: signature.len(),
            });
        }

        for (index, (param, kind)) in signature.params().iter().zip(expected).enumerate() {
            if param.kind != *kind {
                return Err(BindError::ParameterKind {
                    method: self.name.clone(),
                    index,
                    expected: *kind,
                    actual: param.kind,
                });
            }
            match kind {
                ParamKind::Arguments => {
                    let args = args.ok_or_else(|| BindError::MissingArguments {
                        method: self.name.clone(),
                    })?;
                    if args.type_id() != param.type_id {
                        return Err(BindError::ParameterType {
                            method: self.name.clone(),
                            index,
                            expected: param.type_name,
                            actual: args.type_name(),
                        });
                    }
                }
                ParamKind::Context => {
                    if param.type_id != TypeId::of::<TaskContext<'static>>() {
                        return Err(BindError::ParameterType {
                            method: self.name.clone(),
                            index,
                            expected: std::any::type_name::<TaskContext<'static>>(),
                            actual: param.type_name,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn call(
        &self,
        args: Option<&MethodArguments>,
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome, TaskError> {
        let args = match self.inner.shape() {
            MethodShape::WithArgs => args,
            _ => None,
        };
        self.inner.call(args, ctx)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("shape", &self.inner.shape())
            .finish()
    }
}
