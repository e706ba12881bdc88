//! Bean 注册表抽象接口

use crate::bean::BeanDefinition;
use crate::interceptor::InterceptorDefinition;
use crate::observer::ObserverMethod;
use infrastructure_common::{BeanId, TypeKey};
use std::sync::Arc;

/// Bean 注册表 trait
///
/// 构建完成后只读；按声明顺序保存全部定义并提供按类型的索引查找。
pub trait BeanRegistry: Send + Sync {
    /// 按标识查找 Bean
    fn bean(&self, id: &BeanId) -> Option<&Arc<BeanDefinition>>;

    /// 全部 Bean，按声明顺序
    fn beans(&self) -> &[Arc<BeanDefinition>];

    /// 暴露指定类型的 Bean，按声明顺序
    fn beans_of_type(&self, key: TypeKey) -> Vec<Arc<BeanDefinition>>;

    /// 全部拦截器，按声明顺序
    fn interceptors(&self) -> &[Arc<InterceptorDefinition>];

    /// 全部观察者，按声明顺序
    fn observers(&self) -> &[Arc<ObserverMethod>];

    /// 是否包含指定 Bean
    fn contains(&self, id: &BeanId) -> bool {
        self.bean(id).is_some()
    }
}
