//! TAL command behavior over whole documents.

use pretty_assertions::assert_eq;
use tal::{value, Value};

#[track_caller]
fn render(template: &str, ctx: &Value) -> String {
    let template = tal::compile(template).unwrap_or_else(|err| panic!("compile error: {err}"));
    template
        .render_from(ctx)
        .to_string()
        .unwrap_or_else(|err| panic!("render error: {err}"))
}

#[track_caller]
fn check(ctx: Value, template: &str, expected: &str) {
    assert_eq!(render(template, &ctx), expected, "template: {template}");
}

#[test]
fn passthrough() {
    let doc = " <!DOCTYPE html>\n<html>\n<body><h1>Test &lt; &amp; &gt; <b>plan <a>at \
               html</a></b> with an attribute <img src=\"test.png\"></h1><!-- Comment here \
               --></body>\n</html>";
    check(value!({}), doc, doc);
}

#[test]
fn replace_single_tag() {
    check(
        value!({ ContextValue: "Replaced Value" }),
        r#"<body><h1>Test <b tal:replace="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test Replaced Value with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn replace_default_value() {
    check(
        value!({ ContextValue: Default }),
        r#"<body><h1>Test <b tal:replace="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn replace_none_value() {
    check(
        value!({ ContextValue: None }),
        r#"<body><h1>Test <b tal:replace="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test  with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn replace_text_keyword() {
    check(
        value!({ ContextValue: "<b>Some bold & text</b>" }),
        r#"<body><p tal:replace="text ContextValue">plan</p></body>"#,
        r#"<body>&lt;b&gt;Some bold &amp; text&lt;/b&gt;</body>"#,
    );
}

#[test]
fn replace_shadowed_text_keyword() {
    // A capitalized `Text` is a path, not the keyword.
    check(
        value!({ ContextValue: "<b>Some bold & text</b>", Text: "Test Text" }),
        r#"<body><p tal:replace="Text">plan</p></body>"#,
        r#"<body>Test Text</body>"#,
    );
}

#[test]
fn replace_structure_keyword() {
    check(
        value!({ ContextValue: "<b>Some bold &amp; text</b>" }),
        r#"<body><p tal:replace="structure ContextValue">plan</p></body>"#,
        r#"<body><b>Some bold &amp; text</b></body>"#,
    );
}

#[test]
fn content_simple_value() {
    check(
        value!({ ContextValue: "Simple Value goes here" }),
        r#"<body><h1>Test <b tal:content="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one">Simple Value goes here</b> with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn content_none_value() {
    check(
        value!({ ContextValue: None }),
        r#"<body><h1>Test <b tal:content="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one"></b> with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn content_default_value() {
    check(
        value!({ ContextValue: Default }),
        r#"<body><h1>Test <b tal:content="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn content_escapes_text() {
    check(
        value!({ ContextValue: "<b>x & y</b>" }),
        r#"<p tal:content="ContextValue">o</p>"#,
        r#"<p>&lt;b&gt;x &amp; y&lt;/b&gt;</p>"#,
    );
}

#[test]
fn content_text_keyword() {
    check(
        value!({ ContextValue: "<b>Some bold & text</b>" }),
        r#"<body><p tal:content="text ContextValue">plan</p></body>"#,
        r#"<body><p>&lt;b&gt;Some bold &amp; text&lt;/b&gt;</p></body>"#,
    );
}

#[test]
fn content_structure_keyword() {
    check(
        value!({ ContextValue: "<b>x</b>" }),
        r#"<p tal:content="structure ContextValue">o</p>"#,
        r#"<p><b>x</b></p>"#,
    );
}

#[test]
fn content_shadowed_structure_keyword() {
    check(
        value!({ ContextValue: "<b>Some bold & text</b>", Structure: "Test Text" }),
        r#"<body><p tal:content="Structure">plan</p></body>"#,
        r#"<body><p>Test Text</p></body>"#,
    );
}

#[test]
fn condition_false() {
    check(
        value!({ ContextValue: false }),
        r#"<body><h1>Test <b tal:condition="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test  with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn condition_true() {
    check(
        value!({ ContextValue: true }),
        r#"<body><h1>Test <b tal:condition="ContextValue" class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one">plan <a>at html</a></b> with an attribute <img src="test.png"></h1></body>"#,
    );
}

#[test]
fn omit_tag_false() {
    check(
        value!({ ContextValue: false }),
        r#"<body><h1>Test <b tal:omit-tag="ContextValue" class="test" id="one">plan <a>at html</a></b></h1></body>"#,
        r#"<body><h1>Test <b class="test" id="one">plan <a>at html</a></b></h1></body>"#,
    );
}

#[test]
fn omit_tag_true() {
    check(
        value!({ ContextValue: true }),
        r#"<body><h1>Test <b tal:omit-tag="ContextValue" class="test" id="one">plan <a>at html</a></b></h1></body>"#,
        r#"<body><h1>Test plan <a>at html</a></h1></body>"#,
    );
}

#[test]
fn omit_tag_no_expression() {
    check(
        value!({ ContextValue: true }),
        r#"<body><h1>Test <b tal:omit-tag="" class="test" id="one">plan <a>at html</a></b></h1></body>"#,
        r#"<body><h1>Test plan <a>at html</a></h1></body>"#,
    );
}

#[test]
fn repeat_non_sequence() {
    check(
        value!({ ContextValue: false }),
        r#"<body><h1>Test</h1> <ul> <li tal:repeat="vals ContextValue" class="line-item">Value <b tal:content="vals">Vals go here</b> done.</li></ul></body>"#,
        r#"<body><h1>Test</h1> <ul> </ul></body>"#,
    );
}

#[test]
fn repeat_empty_sequence() {
    check(
        value!({ ContextValue: [] }),
        r#"<body><h1>Test</h1> <ul> <li tal:repeat="vals ContextValue" class="line-item">Value <b tal:content="vals">Vals go here</b> done.</li></ul></body>"#,
        r#"<body><h1>Test</h1> <ul> </ul></body>"#,
    );
}

#[test]
fn repeat_default() {
    check(
        value!({ ContextValue: Default, Vals: "Default vals" }),
        r#"<body><h1>Test</h1> <ul> <li tal:repeat="Vals ContextValue" class="line-item">Value <b tal:content="Vals">Vals go here</b> done.</li></ul></body>"#,
        r#"<body><h1>Test</h1> <ul> <li class="line-item">Value <b>Default vals</b> done.</li></ul></body>"#,
    );
}

#[test]
fn repeat_one_entry() {
    // The loop variable shadows the context field and is removed again
    // after the loop.
    check(
        value!({ ContextValue: ["One value"], Vals: "Default vals" }),
        r#"<body><h1>Test</h1> <ul> <li tal:repeat="Vals ContextValue" class="line-item">Value <b tal:content="Vals">Vals go here</b> done.</li></ul><p tal:content="Vals"></p></body>"#,
        r#"<body><h1>Test</h1> <ul> <li class="line-item">Value <b>One value</b> done.</li></ul><p>Default vals</p></body>"#,
    );
}

#[test]
fn repeat_two_entries() {
    check(
        value!({ ContextValue: ["One value", "Two values"] }),
        r#"<body><h1>Test</h1> <ul> <li tal:repeat="vals ContextValue" class="line-item">Value <b tal:content="vals">Vals go here</b> done.</li></ul></body>"#,
        r#"<body><h1>Test</h1> <ul> <li class="line-item">Value <b>One value</b> done.</li><li class="line-item">Value <b>Two values</b> done.</li></ul></body>"#,
    );
}

#[test]
fn repeat_list_scenario() {
    check(
        value!({ Vals: ["One", "Two"] }),
        r#"<ul><li tal:repeat="v Vals" tal:content="v">_</li></ul>"#,
        r#"<ul><li>One</li><li>Two</li></ul>"#,
    );
}

#[test]
fn define_local_no_keyword() {
    check(
        value!({ Value: "One" }),
        r#"<body><p tal:define="avar Value" tal:content="avar"></p><b tal:content="avar"></b></body>"#,
        r#"<body><p>One</p><b></b></body>"#,
    );
}

#[test]
fn define_local_keyword() {
    check(
        value!({ Value: "One" }),
        r#"<body><p tal:define="local avar Value" tal:content="avar"></p><b tal:content="avar"></b></body>"#,
        r#"<body><p>One</p><b></b></body>"#,
    );
}

#[test]
fn define_global_keyword() {
    check(
        value!({ Value: "One" }),
        r#"<body><p tal:define="global avar Value" tal:content="avar"></p><b tal:content="avar"></b></body>"#,
        r#"<body><p>One</p><b>One</b></body>"#,
    );
}

#[test]
fn define_local_nested() {
    check(
        value!({ Value: "One", V2: "Two", V3: "Three" }),
        r#"<body><p tal:define="local avar Value"><h1 tal:replace="avar"></h1><b tal:define="avar V2"><i tal:replace="avar"></i><span tal:define="avar V3"><i tal:replace="avar"></i></span><i tal:replace="avar"></i></b><i tal:replace="avar"></i></p></body>"#,
        r#"<body><p>One<b>Two<span>Three</span>Two</b>One</p></body>"#,
    );
}

#[test]
fn define_global_and_local() {
    check(
        value!({ Value: "One", V2: "Two" }),
        r#"<body><p tal:define="global avar Value;local bvar V2"><h1 tal:content="avar"></h1><h2 tal:content="bvar"></h2></p><b tal:content="avar"></b><i tal:content="bvar"></i></body>"#,
        r#"<body><p><h1>One</h1><h2>Two</h2></p><b>One</b><i></i></body>"#,
    );
}

#[test]
fn attributes_new() {
    check(
        value!({ Value: "One", V2: "Two" }),
        r#"<body><h1 tal:attributes="href V2">Test</h1></body>"#,
        r#"<body><h1 href="Two">Test</h1></body>"#,
    );
}

#[test]
fn attributes_additional() {
    check(
        value!({ Value: "One", V2: "Two" }),
        r##"<body><h1 class="class-one" id="#1" tal:attributes="href V2">Test</h1></body>"##,
        r##"<body><h1 class="class-one" id="#1" href="Two">Test</h1></body>"##,
    );
}

#[test]
fn attributes_remove() {
    check(
        value!({ Value: "One", V2: "Two" }),
        r##"<body><h1 class="class-one" id="#1" tal:attributes="class None">Test</h1></body>"##,
        r##"<body><h1 id="#1">Test</h1></body>"##,
    );
}

#[test]
fn attributes_default() {
    check(
        value!({ Value: "One", V2: "Two", V3: Default }),
        r##"<body><h1 class="class-one" id="#1" tal:attributes="class V3">Test</h1></body>"##,
        r##"<body><h1 class="class-one" id="#1">Test</h1></body>"##,
    );
}

#[test]
fn attributes_many() {
    check(
        value!({ Value: "One", V2: "Two", V3: Default }),
        r##"<body><h1 class="class-one" id="#1" tal:attributes="class V3;id V2;href Value">Test</h1></body>"##,
        r#"<body><h1 class="class-one" id="Two" href="One">Test</h1></body>"#,
    );
}

#[test]
fn attributes_with_content() {
    check(
        value!({ Value: "One", V2: "Two", V3: Default }),
        r##"<body><h1 class="class-one" id="#1" tal:attributes="class V3;id V2;href Value" tal:content="Value">Test</h1></body>"##,
        r#"<body><h1 class="class-one" id="Two" href="One">One</h1></body>"#,
    );
}

#[test]
fn attributes_with_repeat() {
    check(
        value!({ Value: ["One", "Two", Default, "Three", None, "Four"] }),
        r#"<body><ul><li tal:repeat="num Value" tal:attributes="id num" id="default-num">Test</li></ul></body>"#,
        r#"<body><ul><li id="One">Test</li><li id="Two">Test</li><li id="default-num">Test</li><li id="Three">Test</li><li>Test</li><li id="Four">Test</li></ul></body>"#,
    );
}

#[test]
fn attributes_boolean() {
    check(
        value!({ Value: "One", V2: "Two", V3: true, V4: false }),
        r#"<body><h1 tal:attributes="checked V3;default V4" tal:content="Value">Test</h1></body>"#,
        r#"<body><h1 checked="checked">One</h1></body>"#,
    );
}

#[test]
fn attributes_boolean_scenario() {
    check(
        value!({ V3: true, V4: false }),
        r#"<h1 tal:attributes="checked V3;default V4">T</h1>"#,
        r#"<h1 checked="checked">T</h1>"#,
    );
}

#[test]
fn namespaced_tags_and_attributes() {
    check(
        value!({ Value: "One", V2: "Two" }),
        r#"<body><app:h1 tal:attributes="app:href V2;app:class Value;app:id nothing" app:href="DefaultValue" app:id="DefaultValue">Test</app:h1><app:h2>Passthrough</app:h2></body>"#,
        r#"<body><app:h1 app:href="Two" app:class="One">Test</app:h1><app:h2>Passthrough</app:h2></body>"#,
    );
}

#[test]
fn void_element_condition() {
    check(
        value!({ output: true, nooutput: false }),
        r#"<body><img tal:condition="output" href="one"> Second part: <img tal:condition="nooutput" href="two">Hmm</body>"#,
        r#"<body><img href="one"> Second part: Hmm</body>"#,
    );
}

#[test]
fn void_element_define_local() {
    check(
        value!({ output: "Test Out" }),
        r#"<body><img tal:define="title output" tal:attributes="title title"> Second part: <p tal:replace="title"></p></body>"#,
        r#"<body><img title="Test Out"> Second part: </body>"#,
    );
}

#[test]
fn void_element_define_global() {
    check(
        value!({ output: "Test Out" }),
        r#"<body><img tal:define="global title output" tal:attributes="title title"> Second part: <p tal:replace="title"></p></body>"#,
        r#"<body><img title="Test Out"> Second part: Test Out</body>"#,
    );
}

#[test]
fn void_element_repeat() {
    check(
        value!({ output: ["One", "Two"] }),
        r#"<body><img tal:repeat="count output" tal:attributes="title count"> Filler</body>"#,
        r#"<body><img title="One"><img title="Two"> Filler</body>"#,
    );
}

#[test]
fn void_element_content() {
    check(
        value!({ output: "Test Out" }),
        r#"<body><img tal:content="output"> Second part: <p tal:replace="output"></p></body>"#,
        r#"<body><img>Test Out Second part: Test Out</body>"#,
    );
}

#[test]
fn void_element_replace() {
    check(
        value!({ output: "Test Out" }),
        r#"<body><img tal:replace="output"> Second part: <p tal:replace="output"></p></body>"#,
        r#"<body>Test Out Second part: Test Out</body>"#,
    );
}

#[test]
fn void_element_omit_tag() {
    check(
        value!({ output: true }),
        r#"<body><img tal:omit-tag="output" href="one"> Filler.</body>"#,
        r#"<body> Filler.</body>"#,
    );
}

#[test]
fn render_to_writer() {
    let template = tal::compile(r#"<p tal:content="v">x</p>"#).unwrap();
    let ctx = value!({ v: "out" });
    let mut buf = Vec::new();
    template.render_from(&ctx).to_writer(&mut buf).unwrap();
    assert_eq!(buf, b"<p>out</p>");
}

#[test]
fn render_propagates_sink_errors() {
    use std::io;

    struct FailingSink;

    impl io::Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let template = tal::compile("<p>hello</p>").unwrap();
    let ctx = Value::None;
    let err = template.render_from(&ctx).to_writer(FailingSink).unwrap_err();
    assert!(err.to_string().contains("sink closed"), "{err}");
}

#[test]
fn debug_logging_callback() {
    use std::cell::RefCell;

    let lines = RefCell::new(Vec::new());
    let template = tal::compile(r#"<p tal:content="v">x</p>"#).unwrap();
    let ctx = value!({ v: "out" });
    let out = template
        .render_from(&ctx)
        .debug_logging(|args| lines.borrow_mut().push(args.to_string()))
        .to_string()
        .unwrap();
    assert_eq!(out, "<p>out</p>");
    assert!(!lines.borrow().is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn render_serde_context() {
    #[derive(serde::Serialize)]
    #[allow(non_snake_case)]
    struct Context {
        ContextValue: String,
    }

    let ctx = Context {
        ContextValue: "Replaced".into(),
    };
    let template = tal::compile(r#"<b tal:replace="ContextValue" class="x">orig</b>"#).unwrap();
    assert_eq!(template.render(&ctx).to_string().unwrap(), "Replaced");
}
