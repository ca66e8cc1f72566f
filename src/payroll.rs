//! Pure payroll arithmetic. Nothing here touches the store; every
//! function is deterministic in its arguments. Contract violations
//! (zero divisors) are programming errors and abort rather than being
//! silently defaulted.

use crate::model::Loan;

/// Derived hourly rate for part-time employments. Full-time and
/// contract employments carry a zero rate and never call this.
pub fn monthly_hourly_rate(monthly_wage: f64, hours_per_day: f64, days_per_month: f64) -> f64 {
    assert!(
        hours_per_day > 0.0 && days_per_month > 0.0,
        "hourly rate requires positive hours/day and days/month"
    );
    monthly_wage / (hours_per_day * days_per_month)
}

/// Net payable for one pay period.
///
/// `base` is `monthly_wage` for full-time, `hourly_rate * hours_worked`
/// for part-time. Contract payments bypass this formula entirely and
/// are paid as flat one-off amounts per redeemed token.
pub fn final_payable(
    base: f64,
    merits: f64,
    advances: f64,
    demerits: f64,
    loan_deductions: f64,
    monthly_loan_deduction: f64,
) -> f64 {
    base + merits + advances - demerits - loan_deductions - monthly_loan_deduction
}

/// The caller supplies whichever term the issuer chose; amortization
/// computes the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmortizationTerm {
    MonthlyDeduction(f64),
    TenureMonths(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amortization {
    pub total_amount: f64,
    pub monthly_deduction: f64,
    pub tenure_months: u32,
}

/// Flat-interest amortization: `total = principal * (1 + rate / 100)`,
/// `tenure = ceil(total / monthly_deduction)`,
/// `monthly_deduction = total / tenure`.
pub fn loan_amortization(principal: f64, interest_rate: f64, term: AmortizationTerm) -> Amortization {
    assert!(principal > 0.0, "amortization requires a positive principal");
    let total_amount = principal * (1.0 + interest_rate / 100.0);

    match term {
        AmortizationTerm::MonthlyDeduction(monthly_deduction) => {
            assert!(
                monthly_deduction > 0.0,
                "amortization requires a positive monthly deduction"
            );
            Amortization {
                total_amount,
                monthly_deduction,
                tenure_months: (total_amount / monthly_deduction).ceil() as u32,
            }
        }
        AmortizationTerm::TenureMonths(tenure_months) => {
            assert!(tenure_months > 0, "amortization requires a positive tenure");
            Amortization {
                total_amount,
                monthly_deduction: total_amount / tenure_months as f64,
                tenure_months,
            }
        }
    }
}

/// Sum of outstanding balances over a caller-selected subset of loans,
/// falling back to the total amount when nothing was repaid yet.
pub fn foreclose_total(loans: &[Loan]) -> f64 {
    loans.iter().map(Loan::outstanding).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoanStatus;
    use chrono::Utc;

    fn loan(total: f64, remaining: Option<f64>) -> Loan {
        Loan {
            id: "l".into(),
            employer_id: "e".into(),
            employee_id: "w".into(),
            principal: total,
            interest_rate: 0.0,
            total_amount: total,
            remaining_amount: remaining,
            monthly_deduction: 10.0,
            tenure_months: 1,
            status: LoanStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn hourly_rate_part_time() {
        let rate = monthly_hourly_rate(2000.0, 8.0, 22.0);
        assert!((rate - 11.3636).abs() < 1e-4);
    }

    #[test]
    #[should_panic(expected = "positive hours/day")]
    fn hourly_rate_zero_divisor_is_fatal() {
        monthly_hourly_rate(2000.0, 0.0, 22.0);
    }

    #[test]
    fn amortization_from_deduction() {
        let a = loan_amortization(1000.0, 10.0, AmortizationTerm::MonthlyDeduction(110.0));
        assert_eq!(a.total_amount, 1100.0);
        assert_eq!(a.tenure_months, 10);
    }

    #[test]
    fn amortization_from_tenure_is_consistent() {
        let a = loan_amortization(1000.0, 10.0, AmortizationTerm::TenureMonths(10));
        assert_eq!(a.monthly_deduction, 110.0);
        // Re-deriving tenure from the computed deduction lands back on the input.
        let b = loan_amortization(
            1000.0,
            10.0,
            AmortizationTerm::MonthlyDeduction(a.monthly_deduction),
        );
        assert_eq!(b.tenure_months, 10);
    }

    #[test]
    fn amortization_rounds_tenure_up() {
        let a = loan_amortization(1000.0, 10.0, AmortizationTerm::MonthlyDeduction(300.0));
        assert_eq!(a.tenure_months, 4);
    }

    #[test]
    fn final_payable_signs() {
        let net = final_payable(2000.0, 100.0, 50.0, 30.0, 20.0, 110.0);
        assert_eq!(net, 1990.0);
    }

    #[test]
    fn foreclose_total_falls_back_to_total_amount() {
        let loans = vec![loan(500.0, Some(120.0)), loan(300.0, None)];
        assert_eq!(foreclose_total(&loans), 420.0);
    }
}
