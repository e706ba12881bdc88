//! 错误类型定义

use crate::exception::ExceptionKind;
use crate::lifecycle::ScopeKind;
use crate::metadata::{BeanId, InterceptorBinding, QualifierSet, TypeKey};
use thiserror::Error;

/// 目录定义错误
///
/// 在容器启动时检测，致命，启动中止。
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Bean 标识重复: {id}")]
    DuplicateBeanId { id: BeanId },

    #[error("拦截器标识重复: {id}")]
    DuplicateInterceptorId { id: String },

    #[error("观察者标识重复: {id}")]
    DuplicateObserverId { id: String },

    #[error("Bean {bean} 未声明任何可注入类型")]
    NoExposedTypes { bean: BeanId },

    #[error("Bean {bean} 没有构造函数或生产者")]
    MissingCreationStrategy { bean: BeanId },

    #[error("作用域没有注册上下文实现: {bean} 使用 {scope}")]
    MissingContext { bean: BeanId, scope: ScopeKind },

    #[error("拦截器绑定没有对应的拦截器: {bean} 使用 {binding}")]
    UnboundInterceptorBinding {
        bean: BeanId,
        binding: InterceptorBinding,
    },

    #[error("被拦截的 Bean {bean} 暴露的类型 {type_name} 没有生成的包装类型")]
    MissingWrapper {
        bean: BeanId,
        type_name: &'static str,
    },

    #[error("注入点无法解析: {owner}, 原因: {source}")]
    InvalidInjectionPoint {
        owner: String,
        #[source]
        source: ResolutionError,
    },

    #[error("检测到循环依赖: {chain}")]
    CircularDependency { chain: String },

    #[error("作用域不匹配: {bean} ({scope}) 不能直接注入 {dependency} ({dependency_scope})")]
    ScopeMismatch {
        bean: BeanId,
        scope: ScopeKind,
        dependency: BeanId,
        dependency_scope: ScopeKind,
    },

    #[error("生产者 {bean} 的声明 Bean 不存在: {declaring}")]
    UnknownDeclaringBean { bean: BeanId, declaring: BeanId },

    #[error("观察者 {observer} 的所属 Bean 不存在: {owner}")]
    UnknownObserverOwner { observer: String, owner: BeanId },
}

/// 解析错误
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error("没有满足条件的 Bean: 类型 {required}, 限定符 {qualifiers}")]
    Unsatisfied {
        required: TypeKey,
        qualifiers: QualifierSet,
    },

    #[error("存在多个满足条件的 Bean: 类型 {required}, 限定符 {qualifiers}, 候选 {candidates:?}")]
    Ambiguous {
        required: TypeKey,
        qualifiers: QualifierSet,
        candidates: Vec<BeanId>,
    },
}

/// 应用代码抛出的异常
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Exception {
    kind: &'static ExceptionKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Exception {
    /// 创建新的异常
    pub fn new(kind: &'static ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// 附加底层原因
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// 异常种类
    pub fn kind(&self) -> &'static ExceptionKind {
        self.kind
    }

    /// 异常消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 是否为指定种类或其子种类
    pub fn is_a(&self, kind: &ExceptionKind) -> bool {
        self.kind.is_a(kind)
    }
}

/// 调用错误
///
/// 运行期调用（`get()`、业务方法、生命周期回调、观察者）可能返回的全部错误。
/// 只有 [`InvocationError::Exception`] 且种类为受检种类时才受异常包装策略影响，
/// 其余变体都视为未受检，原样传播。
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error(transparent)]
    Exception(#[from] Exception),

    #[error("拦截调用抛出了契约之外的异常: {cause}")]
    Interception {
        #[source]
        cause: Exception,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("作用域未激活: {scope}")]
    ContextNotActive { scope: ScopeKind },

    #[error("循环依赖检测到: {chain}")]
    CircularDependency { chain: String },

    #[error("容器未运行")]
    ContainerNotRunning,

    #[error("非法状态: {message}")]
    IllegalState { message: String },
}

impl InvocationError {
    /// 创建非法状态错误
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// 抛出指定种类的异常
    pub fn raise(kind: &'static ExceptionKind, message: impl Into<String>) -> Self {
        Self::Exception(Exception::new(kind, message))
    }

    /// 如果是应用异常，返回它
    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            InvocationError::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// 如果是包装异常，返回原始原因
    pub fn interception_cause(&self) -> Option<&Exception> {
        match self {
            InvocationError::Interception { cause } => Some(cause),
            _ => None,
        }
    }
}

/// 容器错误
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("容器定义错误: {source}")]
    Definition {
        #[from]
        source: DefinitionError,
    },

    #[error("容器调用错误: {source}")]
    Invocation {
        #[from]
        source: InvocationError,
    },
}

/// 结果类型别名
pub type DefinitionResult<T> = Result<T, DefinitionError>;
pub type ResolutionResult<T> = Result<T, ResolutionError>;
pub type InvocationResult<T> = Result<T, InvocationError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
