//! 目录
//!
//! 构建期描述符生产者交给容器的完整定义集合。容器不做扫描或元数据发现。

use crate::bean::BeanDefinition;
use crate::interceptor::InterceptorDefinition;
use crate::observer::ObserverMethod;

/// 目录
///
/// 定义在各自集合中的下标即声明顺序，相同优先级时按它排序。
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub beans: Vec<BeanDefinition>,
    pub interceptors: Vec<InterceptorDefinition>,
    pub observers: Vec<ObserverMethod>,
}

impl Catalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 Bean 定义
    pub fn bean(mut self, bean: BeanDefinition) -> Self {
        self.beans.push(bean);
        self
    }

    /// 添加拦截器定义
    pub fn interceptor(mut self, interceptor: InterceptorDefinition) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// 添加观察者方法
    pub fn observer(mut self, observer: ObserverMethod) -> Self {
        self.observers.push(observer);
        self
    }

    /// 合并另一个目录，保持各自的声明顺序
    pub fn merge(mut self, other: Catalog) -> Self {
        self.beans.extend(other.beans);
        self.interceptors.extend(other.interceptors);
        self.observers.extend(other.observers);
        self
    }

    /// 定义总数
    pub fn len(&self) -> usize {
        self.beans.len() + self.interceptors.len() + self.observers.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
