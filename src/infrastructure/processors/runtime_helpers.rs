// Helpers that lowered modules call through `babelHelpers.<name>`. The
// bundler ships the ones its modules use in a single `babelHelpers` object.

use std::collections::BTreeSet;

/// (name, implementation, helpers it calls)
const HELPERS: &[(&str, &str, &[&str])] = &[
    (
        "toPrimitive",
        r#"function (t, r) {
    if ("object" != typeof t || !t) return t;
    var e = t[Symbol.toPrimitive];
    if (void 0 !== e) {
      var i = e.call(t, r || "default");
      if ("object" != typeof i) return i;
      throw new TypeError("@@toPrimitive must return a primitive value.");
    }
    return ("string" === r ? String : Number)(t);
  }"#,
        &[],
    ),
    (
        "toPropertyKey",
        r#"function (t) {
    var i = babelHelpers.toPrimitive(t, "string");
    return "symbol" == typeof i ? i : i + "";
  }"#,
        &["toPrimitive"],
    ),
    (
        "defineProperty",
        r#"function (e, r, t) {
    r = babelHelpers.toPropertyKey(r);
    if (r in e) Object.defineProperty(e, r, { value: t, enumerable: true, configurable: true, writable: true });
    else e[r] = t;
    return e;
  }"#,
        &["toPropertyKey"],
    ),
    (
        "checkPrivateRedeclaration",
        r#"function (e, t) {
    if (t.has(e)) throw new TypeError("Cannot initialize the same private elements twice on an object");
  }"#,
        &[],
    ),
    (
        "classPrivateFieldInitSpec",
        r#"function (e, t, a) {
    babelHelpers.checkPrivateRedeclaration(e, t);
    t.set(e, a);
  }"#,
        &["checkPrivateRedeclaration"],
    ),
    (
        "classPrivateMethodInitSpec",
        r#"function (e, a) {
    babelHelpers.checkPrivateRedeclaration(e, a);
    a.add(e);
  }"#,
        &["checkPrivateRedeclaration"],
    ),
    (
        "assertClassBrand",
        r#"function (e, t, n) {
    if ("function" == typeof e ? e === t : e.has(t)) return arguments.length < 3 ? t : n;
    throw new TypeError("Private element is not present on this object");
  }"#,
        &[],
    ),
    (
        "classPrivateFieldGet2",
        r#"function (s, a) {
    return s.get(babelHelpers.assertClassBrand(s, a));
  }"#,
        &["assertClassBrand"],
    ),
    (
        "classPrivateFieldSet2",
        r#"function (s, a, r) {
    s.set(babelHelpers.assertClassBrand(s, a), r);
    return r;
  }"#,
        &["assertClassBrand"],
    ),
    (
        "checkInRHS",
        r#"function (e) {
    if (Object(e) !== e) throw new TypeError("right-hand side of 'in' should be an object, got " + (null !== e ? typeof e : "null"));
    return e;
  }"#,
        &[],
    ),
    (
        "readOnlyError",
        r#"function (r) {
    throw new TypeError('"' + r + '" is read-only');
  }"#,
        &[],
    ),
    (
        "writeOnlyError",
        r#"function (r) {
    throw new TypeError('"' + r + '" is write-only');
  }"#,
        &[],
    ),
    (
        "asyncGeneratorStep",
        r#"function (n, t, e, r, o, a, c) {
    try {
      var i = n[a](c), u = i.value;
    } catch (err) {
      e(err);
      return;
    }
    i.done ? t(u) : Promise.resolve(u).then(r, o);
  }"#,
        &[],
    ),
    (
        "asyncToGenerator",
        r#"function (n) {
    return function () {
      var t = this, e = arguments;
      return new Promise(function (r, o) {
        var a = n.apply(t, e);
        function _next(v) { babelHelpers.asyncGeneratorStep(a, r, o, _next, _throw, "next", v); }
        function _throw(v) { babelHelpers.asyncGeneratorStep(a, r, o, _next, _throw, "throw", v); }
        _next(void 0);
      });
    };
  }"#,
        &["asyncGeneratorStep"],
    ),
    (
        "ownKeys",
        r#"function (e, r) {
    var t = Object.keys(e);
    if (Object.getOwnPropertySymbols) {
      var o = Object.getOwnPropertySymbols(e);
      if (r) o = o.filter(function (s) { return Object.getOwnPropertyDescriptor(e, s).enumerable; });
      t.push.apply(t, o);
    }
    return t;
  }"#,
        &[],
    ),
    (
        "objectSpread2",
        r#"function (e) {
    for (var r = 1; r < arguments.length; r++) {
      var t = null != arguments[r] ? arguments[r] : {};
      if (r % 2) {
        babelHelpers.ownKeys(Object(t), true).forEach(function (k) { babelHelpers.defineProperty(e, k, t[k]); });
      } else if (Object.getOwnPropertyDescriptors) {
        Object.defineProperties(e, Object.getOwnPropertyDescriptors(t));
      } else {
        babelHelpers.ownKeys(Object(t)).forEach(function (k) { Object.defineProperty(e, k, Object.getOwnPropertyDescriptor(t, k)); });
      }
    }
    return e;
  }"#,
        &["ownKeys", "defineProperty"],
    ),
    (
        "objectWithoutPropertiesLoose",
        r#"function (r, e) {
    if (null == r) return {};
    var t = {};
    for (var n in r) {
      if ({}.hasOwnProperty.call(r, n)) {
        if (-1 !== e.indexOf(n)) continue;
        t[n] = r[n];
      }
    }
    return t;
  }"#,
        &[],
    ),
    (
        "objectWithoutProperties",
        r#"function (e, t) {
    if (null == e) return {};
    var i = babelHelpers.objectWithoutPropertiesLoose(e, t);
    if (Object.getOwnPropertySymbols) {
      var n = Object.getOwnPropertySymbols(e);
      for (var r = 0; r < n.length; r++) {
        var o = n[r];
        if (-1 === t.indexOf(o) && {}.propertyIsEnumerable.call(e, o)) i[o] = e[o];
      }
    }
    return i;
  }"#,
        &["objectWithoutPropertiesLoose"],
    ),
    (
        "objectDestructuringEmpty",
        r#"function (t) {
    if (null == t) throw new TypeError("Cannot destructure " + t);
  }"#,
        &[],
    ),
    (
        "extends",
        r#"function () {
    return Object.assign.apply(Object, arguments);
  }"#,
        &[],
    ),
    (
        "taggedTemplateLiteral",
        r#"function (e, t) {
    if (!t) t = e.slice(0);
    return Object.freeze(Object.defineProperties(e, { raw: { value: Object.freeze(t) } }));
  }"#,
        &[],
    ),
];

fn lookup(name: &str) -> Option<&'static (&'static str, &'static str, &'static [&'static str])> {
    HELPERS.iter().find(|(helper, _, _)| *helper == name)
}

pub fn is_available(name: &str) -> bool {
    lookup(name).is_some()
}

/// `var babelHelpers = {...};` holding `used` and everything they call,
/// or nothing when no module needs a helper
pub fn helper_runtime<'a>(used: impl IntoIterator<Item = &'a str>) -> String {
    let mut needed: BTreeSet<&'static str> = BTreeSet::new();
    let mut stack: Vec<&str> = used.into_iter().collect();

    while let Some(name) = stack.pop() {
        if let Some((helper, _, deps)) = lookup(name) {
            if needed.insert(*helper) {
                stack.extend(deps.iter().copied());
            }
        }
    }

    if needed.is_empty() {
        return String::new();
    }

    let entries: Vec<String> = HELPERS
        .iter()
        .filter(|(name, _, _)| needed.contains(name))
        .map(|(name, body, _)| format!("  \"{}\": {}", name, body))
        .collect();
    format!("var babelHelpers = {{\n{}\n}};\n", entries.join(",\n"))
}
