//! Builtins inferred by running them on stand-in values.
//!
//! Builtins without a dedicated rule are evaluated on a concrete value of
//! each argument type (see [`crate::host::dummy_value`]) and the result
//! converted back into a type. A result keeps its scalar value only when
//! every argument was itself a single known value.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::host::Value;

static SIMULATED: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["divmod", "round", "pow", "ord", "chr", "sorted"].into_iter().collect());

pub fn is_simulated(name: &str) -> bool {
    SIMULATED.contains(name)
}

/// Runs builtin `name` on `args`. `None` when the builtin is not simulated.
pub fn evaluate(name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    if !is_simulated(name) {
        return None;
    }
    Some(match name {
        "divmod" => divmod(args),
        "round" => round(args),
        "pow" => pow(args),
        "ord" => ord(args),
        "chr" => chr(args),
        "sorted" => sorted(args),
        _ => Err(format!("no simulation for '{name}'")),
    })
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        return Err(format!(
            "{name}() takes {min} to {max} arguments ({} given)",
            args.len()
        ));
    }
    Ok(())
}

fn number(name: &str, v: &Value) -> Result<Value, String> {
    match v {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(_) | Value::Float(_) => Ok(v.clone()),
        other => Err(format!(
            "unsupported operand type for {name}(): '{}'",
            other.type_name()
        )),
    }
}

fn divmod(args: &[Value]) -> Result<Value, String> {
    arity("divmod", args, 2, 2)?;
    match (number("divmod", &args[0])?, number("divmod", &args[1])?) {
        (Value::Int(a), Value::Int(b)) => {
            if b == 0 {
                return Err("integer division or modulo by zero".to_string());
            }
            let q = a.checked_div_euclid(b).ok_or("integer overflow")?;
            let r = a - q * b;
            // floor semantics: the remainder takes the sign of the divisor
            let (q, r) = if r != 0 && (r < 0) != (b < 0) {
                (q - 1, r + b)
            } else {
                (q, r)
            };
            Ok(Value::Tuple(vec![Value::Int(q), Value::Int(r)]))
        }
        (a, b) => {
            let (a, b) = (a.as_float().unwrap_or_default(), b.as_float().unwrap_or_default());
            if b == 0.0 {
                return Err("float divmod()".to_string());
            }
            let q = (a / b).floor();
            Ok(Value::Tuple(vec![Value::Float(q), Value::Float(a - q * b)]))
        }
    }
}

fn round(args: &[Value]) -> Result<Value, String> {
    arity("round", args, 1, 2)?;
    let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(d) => Some(d.as_int().ok_or("round() digits must be an integer")?),
    };
    match (number("round", &args[0])?, digits) {
        (Value::Int(n), _) => Ok(Value::Int(n)),
        (Value::Float(x), None) => {
            let r = round_half_even(x);
            if !r.is_finite() {
                return Err("cannot convert float to integer".to_string());
            }
            Ok(Value::Int(r as i64))
        }
        (Value::Float(x), Some(d)) => {
            let scale = 10f64.powi(d.clamp(-308, 308) as i32);
            Ok(Value::Float(round_half_even(x * scale) / scale))
        }
        _ => Err("round() argument must be a number".to_string()),
    }
}

fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

fn pow(args: &[Value]) -> Result<Value, String> {
    arity("pow", args, 2, 3)?;
    let base = number("pow", &args[0])?;
    let exp = number("pow", &args[1])?;
    if let Some(modulus) = args.get(2) {
        let (Value::Int(b), Value::Int(e), Some(m)) = (&base, &exp, modulus.as_int()) else {
            return Err("pow() 3rd argument not allowed unless all arguments are integers".to_string());
        };
        if m == 0 {
            return Err("pow() 3rd argument cannot be 0".to_string());
        }
        if *e < 0 {
            return Err("pow() negative exponent with modulus".to_string());
        }
        let mut result: i128 = 1;
        let m = i128::from(m);
        let mut b = i128::from(*b).rem_euclid(m);
        let mut e = *e;
        while e > 0 {
            if e & 1 == 1 {
                result = (result * b).rem_euclid(m);
            }
            b = (b * b).rem_euclid(m);
            e >>= 1;
        }
        return Ok(Value::Int(result as i64));
    }
    match (base, exp) {
        (Value::Int(b), Value::Int(e)) if e >= 0 => u32::try_from(e)
            .ok()
            .and_then(|e| b.checked_pow(e))
            .map(Value::Int)
            .ok_or_else(|| "integer overflow in pow()".to_string()),
        (b, e) => Ok(Value::Float(
            b.as_float().unwrap_or_default().powf(e.as_float().unwrap_or_default()),
        )),
    }
}

fn ord(args: &[Value]) -> Result<Value, String> {
    arity("ord", args, 1, 1)?;
    match &args[0] {
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                )),
            }
        }
        other => Err(format!(
            "ord() expected string of length 1, but {} found",
            other.type_name()
        )),
    }
}

fn chr(args: &[Value]) -> Result<Value, String> {
    arity("chr", args, 1, 1)?;
    let code = args[0].as_int().ok_or("an integer is required")?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::Str(c.to_string()))
        .ok_or_else(|| "chr() arg not in range(0x110000)".to_string())
}

fn sorted(args: &[Value]) -> Result<Value, String> {
    arity("sorted", args, 1, 1)?;
    let mut items = match &args[0] {
        Value::List(items) | Value::Tuple(items) => items.clone(),
        Value::Dict(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        other => return Err(format!("'{}' object is not iterable", other.type_name())),
    };
    let numeric = items.iter().all(|v| v.as_float().is_some());
    if numeric {
        items.sort_by(|a, b| {
            let (a, b) = (a.as_float().unwrap_or_default(), b.as_float().unwrap_or_default());
            a.total_cmp(&b)
        });
    } else if items.iter().all(|v| matches!(v, Value::Str(_))) {
        items.sort_by(|a, b| match (a, b) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        });
    } else if items.len() > 1 {
        return Err("'<' not supported between these elements".to_string());
    }
    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(name: &str, args: &[Value]) -> Result<Value, String> {
        evaluate(name, args).expect("simulated builtin")
    }

    #[test]
    fn test_divmod_floors() {
        assert_eq!(
            run("divmod", &[Value::Int(7), Value::Int(2)]),
            Ok(Value::Tuple(vec![Value::Int(3), Value::Int(1)]))
        );
        assert_eq!(
            run("divmod", &[Value::Int(-7), Value::Int(2)]),
            Ok(Value::Tuple(vec![Value::Int(-4), Value::Int(1)]))
        );
        assert_eq!(
            run("divmod", &[Value::Int(7), Value::Int(-2)]),
            Ok(Value::Tuple(vec![Value::Int(-4), Value::Int(-1)]))
        );
        assert!(run("divmod", &[Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(run("round", &[Value::Float(2.5)]), Ok(Value::Int(2)));
        assert_eq!(run("round", &[Value::Float(3.5)]), Ok(Value::Int(4)));
        assert_eq!(run("round", &[Value::Float(-2.5)]), Ok(Value::Int(-2)));
        assert_eq!(run("round", &[Value::Float(1.25), Value::Int(1)]), Ok(Value::Float(1.2)));
    }

    #[test]
    fn test_pow() {
        assert_eq!(run("pow", &[Value::Int(2), Value::Int(10)]), Ok(Value::Int(1024)));
        assert_eq!(run("pow", &[Value::Int(2), Value::Int(-1)]), Ok(Value::Float(0.5)));
        assert_eq!(
            run("pow", &[Value::Int(3), Value::Int(4), Value::Int(5)]),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn test_characters() {
        assert_eq!(run("ord", &[Value::Str("a".into())]), Ok(Value::Int(97)));
        assert_eq!(run("chr", &[Value::Int(98)]), Ok(Value::Str("b".into())));
        assert!(run("ord", &[Value::Str("ab".into())]).is_err());
    }

    #[test]
    fn test_sorted_and_unknown() {
        assert_eq!(
            run("sorted", &[Value::Tuple(vec![Value::Int(3), Value::Float(1.5)])]),
            Ok(Value::List(vec![Value::Float(1.5), Value::Int(3)]))
        );
        assert!(evaluate("open", &[]).is_none());
    }
}
