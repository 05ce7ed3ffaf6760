//! 多步驟表單（wizard）狀態機。
//!
//! 狀態為 `{current, completed, validating, data}`。驗證是非同步的，
//! 驗證進行中所有導覽操作都回傳 [`Transition::Busy`]，狀態不變。
//! 內部鎖只在同步區段持有，不會跨越 `.await`。
//! 完成後為終止狀態，之後的導覽都回傳 [`Transition::AtBoundary`]。

use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

/// 單一步驟的驗證器，可以包含遠端檢查
#[async_trait]
pub trait StepValidator<D: Send + Sync>: Send + Sync {
    /// `Ok(true)` 表示可以前進；`Ok(false)` 或 `Err` 都會停在原步驟
    async fn validate(&self, step: &str, index: usize, data: &D) -> Result<bool>;
}

/// 不做任何檢查的驗證器
pub struct AcceptAll;

#[async_trait]
impl<D: Send + Sync> StepValidator<D> for AcceptAll {
    async fn validate(&self, _step: &str, _index: usize, _data: &D) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition<D> {
    Moved { from: usize, to: usize },
    Completed(D),
    /// 驗證失敗或目標不允許，狀態不變
    Stayed,
    /// 已在邊界（例如在第一步按上一步）
    AtBoundary,
    /// 驗證進行中
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardSnapshot<D> {
    pub current: usize,
    pub current_step: String,
    pub completed: BTreeSet<usize>,
    pub validating: bool,
    pub finished: bool,
    pub data: D,
}

#[derive(Debug)]
struct WizardState<D> {
    current: usize,
    completed: BTreeSet<usize>,
    validating: bool,
    finished: bool,
    data: D,
}

type CompleteCallback<D> = Box<dyn Fn(&D) + Send + Sync>;

pub struct Wizard<D, V> {
    steps: Vec<String>,
    validator: V,
    state: Mutex<WizardState<D>>,
    on_complete: Option<CompleteCallback<D>>,
}

/// 離開作用域時清掉 validating 旗標；必須比狀態鎖晚釋放
struct ValidatingGuard<'a, D> {
    state: &'a Mutex<WizardState<D>>,
}

impl<D> Drop for ValidatingGuard<'_, D> {
    fn drop(&mut self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.validating = false;
    }
}

impl<D, V> Wizard<D, V>
where
    D: Clone + Send + Sync,
    V: StepValidator<D>,
{
    pub fn new<S: Into<String>>(
        steps: impl IntoIterator<Item = S>,
        data: D,
        validator: V,
    ) -> Result<Self> {
        let steps: Vec<String> = steps.into_iter().map(Into::into).collect();
        if steps.is_empty() {
            return Err(PortalError::validation("wizard needs at least one step"));
        }
        Ok(Self {
            steps,
            validator,
            state: Mutex::new(WizardState {
                current: 0,
                completed: BTreeSet::new(),
                validating: false,
                finished: false,
                data,
            }),
            on_complete: None,
        })
    }

    pub fn with_on_complete(mut self, callback: impl Fn(&D) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn snapshot(&self) -> WizardSnapshot<D> {
        let state = self.lock();
        WizardSnapshot {
            current: state.current,
            current_step: self.steps[state.current].clone(),
            completed: state.completed.clone(),
            validating: state.validating,
            finished: state.finished,
            data: state.data.clone(),
        }
    }

    pub fn is_validating(&self) -> bool {
        self.lock().validating
    }

    /// 修改資料；驗證進行中時回傳 false 且不修改
    pub fn update_data(&self, f: impl FnOnce(&mut D)) -> bool {
        let mut state = self.lock();
        if state.validating {
            return false;
        }
        f(&mut state.data);
        true
    }

    pub async fn next(&self) -> Transition<D> {
        let (from, data) = {
            let mut state = self.lock();
            if state.validating {
                return Transition::Busy;
            }
            if state.finished {
                return Transition::AtBoundary;
            }
            state.validating = true;
            (state.current, state.data.clone())
        };

        let _guard = ValidatingGuard { state: &self.state };
        if !self.run_validation(from, &data).await {
            return Transition::Stayed;
        }

        let mut state = self.lock();
        state.completed.insert(from);
        if from + 1 >= self.steps.len() {
            state.finished = true;
            let data = state.data.clone();
            drop(state);
            tracing::info!("✅ Wizard completed at step '{}'", self.steps[from]);
            if let Some(callback) = &self.on_complete {
                callback(&data);
            }
            return Transition::Completed(data);
        }

        state.current = from + 1;
        tracing::debug!("Wizard moved {} -> {}", self.steps[from], self.steps[from + 1]);
        Transition::Moved { from, to: from + 1 }
    }

    pub fn previous(&self) -> Transition<D> {
        let mut state = self.lock();
        if state.validating {
            return Transition::Busy;
        }
        if state.finished || state.current == 0 {
            return Transition::AtBoundary;
        }
        let from = state.current;
        state.current -= 1;
        Transition::Moved {
            from,
            to: state.current,
        }
    }

    /// 只能跳到目前或之前的步驟，或曾經完成的步驟；往前跳會先驗證目前步驟
    pub async fn go_to(&self, target: usize) -> Transition<D> {
        let (from, data) = {
            let mut state = self.lock();
            if state.validating {
                return Transition::Busy;
            }
            if state.finished {
                return Transition::AtBoundary;
            }
            if target >= self.steps.len() {
                return Transition::Stayed;
            }
            let from = state.current;
            if target == from {
                return Transition::Stayed;
            }
            if target < from {
                state.current = target;
                return Transition::Moved { from, to: target };
            }
            if !state.completed.contains(&target) {
                tracing::debug!(
                    "Wizard jump to step {} rejected (not completed yet)",
                    target
                );
                return Transition::Stayed;
            }
            state.validating = true;
            (from, state.data.clone())
        };

        let _guard = ValidatingGuard { state: &self.state };
        if !self.run_validation(from, &data).await {
            return Transition::Stayed;
        }

        let mut state = self.lock();
        state.completed.insert(from);
        state.current = target;
        Transition::Moved { from, to: target }
    }

    async fn run_validation(&self, index: usize, data: &D) -> bool {
        let step = &self.steps[index];
        match self.validator.validate(step, index, data).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!("Step '{}' did not pass validation", step);
                false
            }
            Err(e) => {
                tracing::warn!("⚠️ Validation of step '{}' failed: {}", step, e);
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WizardState<D>> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::PortalError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    const STEPS: [&str; 3] = ["service", "details", "contact"];

    struct RejectStep(usize);

    #[async_trait]
    impl StepValidator<u32> for RejectStep {
        async fn validate(&self, _step: &str, index: usize, _data: &u32) -> Result<bool> {
            Ok(index != self.0)
        }
    }

    struct RejectOdd;

    #[async_trait]
    impl StepValidator<u32> for RejectOdd {
        async fn validate(&self, _step: &str, _index: usize, data: &u32) -> Result<bool> {
            Ok(data % 2 == 0)
        }
    }

    struct FailingValidator;

    #[async_trait]
    impl StepValidator<u32> for FailingValidator {
        async fn validate(&self, _step: &str, _index: usize, _data: &u32) -> Result<bool> {
            Err(PortalError::validation("remote check unavailable"))
        }
    }

    /// 等到被通知才回傳，用來模擬進行中的遠端驗證
    struct GatedValidator {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl StepValidator<u32> for GatedValidator {
        async fn validate(&self, _step: &str, _index: usize, _data: &u32) -> Result<bool> {
            self.gate.notified().await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_next_walks_to_completion() {
        let wizard = Wizard::new(STEPS, 7u32, AcceptAll).unwrap();
        assert_eq!(wizard.next().await, Transition::Moved { from: 0, to: 1 });
        assert_eq!(wizard.next().await, Transition::Moved { from: 1, to: 2 });
        assert_eq!(wizard.next().await, Transition::Completed(7));

        let snapshot = wizard.snapshot();
        assert_eq!(snapshot.current, 2);
        assert!(snapshot.finished);
        assert_eq!(snapshot.completed.len(), 3);
    }

    #[tokio::test]
    async fn test_next_never_passes_last_step() {
        let wizard = Wizard::new(STEPS, 0u32, AcceptAll).unwrap();
        for _ in 0..10 {
            wizard.next().await;
        }
        assert_eq!(wizard.snapshot().current, STEPS.len() - 1);
    }

    #[tokio::test]
    async fn test_previous_stops_at_zero() {
        let wizard = Wizard::new(STEPS, 0u32, AcceptAll).unwrap();
        assert_eq!(wizard.previous(), Transition::AtBoundary);
        wizard.next().await;
        assert_eq!(wizard.previous(), Transition::Moved { from: 1, to: 0 });
        assert_eq!(wizard.previous(), Transition::AtBoundary);
        assert_eq!(wizard.snapshot().current, 0);
    }

    #[tokio::test]
    async fn test_failed_validation_stays() {
        let wizard = Wizard::new(STEPS, 0u32, RejectStep(1)).unwrap();
        wizard.next().await;
        assert_eq!(wizard.next().await, Transition::Stayed);
        let snapshot = wizard.snapshot();
        assert_eq!(snapshot.current, 1);
        assert!(!snapshot.completed.contains(&1));
        assert!(!snapshot.validating);
    }

    #[tokio::test]
    async fn test_validator_error_is_swallowed() {
        let wizard = Wizard::new(STEPS, 0u32, FailingValidator).unwrap();
        assert_eq!(wizard.next().await, Transition::Stayed);
        assert_eq!(wizard.snapshot().current, 0);
        assert!(!wizard.is_validating());
    }

    #[tokio::test]
    async fn test_go_to_rules() {
        let wizard = Wizard::new(["a", "b", "c", "d"], 0u32, AcceptAll).unwrap();
        // 尚未完成任何步驟，不能往前跳
        assert_eq!(wizard.go_to(1).await, Transition::Stayed);
        assert_eq!(wizard.go_to(9).await, Transition::Stayed);

        wizard.next().await;
        wizard.next().await;
        assert_eq!(wizard.snapshot().current, 2);

        // 超過最高完成步驟 + 1
        assert_eq!(wizard.go_to(3).await, Transition::Stayed);

        assert_eq!(wizard.go_to(0).await, Transition::Moved { from: 2, to: 0 });
        // 步驟 1 曾完成，可以直接跳回
        assert_eq!(wizard.go_to(1).await, Transition::Moved { from: 0, to: 1 });
        assert_eq!(wizard.snapshot().current, 1);
    }

    #[tokio::test]
    async fn test_go_to_forward_validates_current_step() {
        let wizard = Wizard::new(["a", "b", "c"], 0u32, RejectOdd).unwrap();
        wizard.next().await;
        wizard.next().await;
        wizard.go_to(0).await;

        // 回到第一步後把資料改成無效，往前跳應被擋下
        wizard.update_data(|d| *d = 1);
        assert_eq!(wizard.go_to(1).await, Transition::Stayed);
        assert_eq!(wizard.snapshot().current, 0);

        wizard.update_data(|d| *d = 2);
        assert_eq!(wizard.go_to(1).await, Transition::Moved { from: 0, to: 1 });
    }

    #[tokio::test]
    async fn test_navigation_is_blocked_while_validating() {
        let gate = Arc::new(Notify::new());
        let wizard = Wizard::new(STEPS, 0u32, GatedValidator { gate: gate.clone() }).unwrap();

        let (first, _) = tokio::join!(wizard.next(), async {
            tokio::task::yield_now().await;
            assert!(wizard.is_validating());
            assert_eq!(wizard.next().await, Transition::Busy);
            assert_eq!(wizard.previous(), Transition::Busy);
            assert_eq!(wizard.go_to(0).await, Transition::Busy);
            assert!(!wizard.update_data(|d| *d = 99));
            gate.notify_one();
        });

        assert_eq!(first, Transition::Moved { from: 0, to: 1 });
        let snapshot = wizard.snapshot();
        assert_eq!(snapshot.current, 1);
        assert_eq!(snapshot.data, 0);
        assert!(!snapshot.validating);
    }

    #[tokio::test]
    async fn test_on_complete_receives_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let wizard = Wizard::new(["only"], 5u32, AcceptAll)
            .unwrap()
            .with_on_complete(move |data| {
                assert_eq!(*data, 6);
                seen.fetch_add(1, Ordering::SeqCst);
            });

        assert!(wizard.update_data(|d| *d += 1));
        assert_eq!(wizard.next().await, Transition::Completed(6));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_wizard_is_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let wizard = Wizard::new(["a", "b"], 0u32, AcceptAll)
            .unwrap()
            .with_on_complete(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });

        wizard.next().await;
        assert_eq!(wizard.next().await, Transition::Completed(0));

        // 完成後不再重新驗證，也不會再次觸發 on_complete
        assert_eq!(wizard.next().await, Transition::AtBoundary);
        assert_eq!(wizard.next().await, Transition::AtBoundary);
        assert_eq!(wizard.go_to(0).await, Transition::AtBoundary);
        assert_eq!(wizard.previous(), Transition::AtBoundary);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = wizard.snapshot();
        assert!(snapshot.finished);
        assert_eq!(snapshot.current, 1);
    }

    #[test]
    fn test_wizard_without_steps_is_rejected() {
        let result = Wizard::new(Vec::<String>::new(), 0u32, AcceptAll);
        assert!(matches!(result, Err(PortalError::ValidationError { .. })));
    }
}
