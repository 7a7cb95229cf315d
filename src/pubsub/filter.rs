use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::Event;
use crate::error::{PubSubError, PubSubResult};

/// Оператор сравнения в условии фильтра.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Одно условие: поле события, оператор и значение-операнд.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        let actual = event.field_value(&self.field);
        match self.op {
            FilterOp::Eq => actual.map(|v| json_eq(&v, &self.value)).unwrap_or(false),
            // Отсутствующее поле считается "не равным"
            FilterOp::Ne => actual.map(|v| !json_eq(&v, &self.value)).unwrap_or(true),
            FilterOp::Gt => num_cmp(actual, &self.value).map(|o| o > 0.0).unwrap_or(false),
            FilterOp::Gte => num_cmp(actual, &self.value).map(|o| o >= 0.0).unwrap_or(false),
            FilterOp::Lt => num_cmp(actual, &self.value).map(|o| o < 0.0).unwrap_or(false),
            FilterOp::Lte => num_cmp(actual, &self.value).map(|o| o <= 0.0).unwrap_or(false),
        }
    }
}

/// Предикат подписки: конъюнкция (AND) условий по полям события.
///
/// Пустой фильтр пропускает любое событие подходящего типа. Проверка
/// типа события в предикат не входит: её делает fanout до вызова
/// `matches`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    /// Фильтр без условий: совпадает со всеми событиями типа подписки.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Добавляет условие (builder-стиль).
    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::new(field, op, value));
        self
    }

    /// Чистая проверка предиката; ничего не мутирует.
    pub fn matches(&self, event: &Event) -> bool {
        self.clauses.iter().all(|clause| clause.matches(event))
    }

    /// Валидация на этапе подписки, чтобы не падать молча при матче.
    pub fn validate(&self) -> PubSubResult<()> {
        for clause in &self.clauses {
            if clause.field.is_empty() {
                return Err(PubSubError::Validation(
                    "clause field name must not be empty".to_string(),
                ));
            }
            let ordered = matches!(
                clause.op,
                FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte
            );
            if ordered && !clause.value.is_number() {
                return Err(PubSubError::Validation(format!(
                    "ordering operator on field '{}' requires a numeric value",
                    clause.field
                )));
            }
        }
        Ok(())
    }
}

/// Равенство с нормализацией чисел: целое и дробное представление
/// одного числа считаются равными.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Разница `actual - operand` для числовых операндов; `None`, если
/// поле отсутствует или хотя бы одна сторона не число.
fn num_cmp(actual: Option<Value>, operand: &Value) -> Option<f64> {
    let x = actual?.as_f64()?;
    let y = operand.as_f64()?;
    Some(x - y)
}
