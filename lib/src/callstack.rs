use std::collections::HashMap;

use serde_json::{json, Map};

use crate::{
    json_read, json_write,
    object::ContentGraph,
    path::Path,
    pointer::{self, Pointer},
    push_pop::PushPopType,
    story_error::StoryError,
    value_type::ValueType,
};

/// One activation frame.
#[derive(Debug, Clone)]
pub struct Element {
    pub current_pointer: Pointer,
    pub in_expression_evaluation: bool,
    pub temporary_variables: HashMap<String, ValueType>,
    pub push_pop_type: PushPopType,
    /// Bookmarks used to clean up when the frame is popped.
    pub evaluation_stack_height_when_pushed: usize,
    pub function_start_in_output_stream: i32,
}

impl Element {
    fn new(push_pop_type: PushPopType, pointer: Pointer, in_expression_evaluation: bool) -> Element {
        Element {
            current_pointer: pointer,
            in_expression_evaluation,
            temporary_variables: HashMap::new(),
            push_pop_type,
            evaluation_stack_height_when_pushed: 0,
            function_start_in_output_stream: 0,
        }
    }
}

/// A narrative thread: its own private stack of frames.
#[derive(Debug, Clone)]
pub struct Thread {
    pub callstack: Vec<Element>,
    pub previous_pointer: Pointer,
    pub thread_index: usize,
}

impl Thread {
    fn new() -> Thread {
        Thread {
            callstack: Vec::new(),
            previous_pointer: pointer::NULL,
            thread_index: 0,
        }
    }

    pub(crate) fn from_json(graph: &ContentGraph, j_obj: &Map<String, serde_json::Value>) -> Result<Thread, StoryError> {
        let mut thread = Thread::new();

        thread.thread_index = j_obj
            .get("threadIndex")
            .and_then(|i| i.as_u64())
            .ok_or(StoryError::BadJson("Invalid thread index".to_owned()))? as usize;

        let j_thread_callstack = j_obj
            .get("callstack")
            .and_then(|callstack| callstack.as_array())
            .ok_or(StoryError::BadJson("Thread without callstack".to_owned()))?;

        for j_el_tok in j_thread_callstack.iter() {
            let j_element_obj = j_el_tok
                .as_object()
                .ok_or(StoryError::BadJson("Invalid callstack element".to_owned()))?;

            let push_pop_type = PushPopType::from_value(
                j_element_obj
                    .get("type")
                    .and_then(|t| t.as_u64())
                    .ok_or(StoryError::BadJson("Invalid push/pop type".to_owned()))? as usize,
            )?;

            let mut pointer = pointer::NULL;

            if let Some(current_container_path_str) = j_element_obj.get("cPath").and_then(|c| c.as_str()) {
                let thread_pointer_result = graph.content_at_path(
                    graph.root(),
                    &Path::new_with_components_string(Some(current_container_path_str)),
                    0,
                    None,
                );

                pointer.container = thread_pointer_result.container(graph);
                pointer.index = j_element_obj
                    .get("idx")
                    .and_then(|i| i.as_i64())
                    .ok_or(StoryError::BadJson("Invalid pointer index".to_owned()))? as i32;

                if pointer.container.is_none() {
                    return Err(StoryError::BadJson(format!(
                        "When loading state, internal story location couldn't be found: '{current_container_path_str}'. Has the story changed since this save data was created?"
                    )));
                }

                if thread_pointer_result.approximate {
                    tracing::warn!(
                        "When loading state, exact internal story location couldn't be found: '{}', so it was approximated to '{}' to recover. Has the story changed since this save data was created?",
                        current_container_path_str,
                        graph.get_path(thread_pointer_result.obj)
                    );
                }
            }

            let in_expression_evaluation = j_element_obj
                .get("exp")
                .and_then(|exp| exp.as_bool())
                .unwrap_or(false);

            let mut el = Element::new(push_pop_type, pointer, in_expression_evaluation);

            if let Some(temps) = j_element_obj.get("temp").and_then(|temp| temp.as_object()) {
                el.temporary_variables = json_read::jobject_to_hashmap_values(temps)?;
            }

            thread.callstack.push(el);
        }

        if let Some(prev_content_obj_path) = j_obj.get("previousContentObject").and_then(|p| p.as_str()) {
            let prev_path = Path::new_with_components_string(Some(prev_content_obj_path));
            thread.previous_pointer = graph.pointer_at_path(&prev_path)?;
        }

        Ok(thread)
    }

    pub(crate) fn write_json(&self, graph: &ContentGraph) -> Result<serde_json::Value, StoryError> {
        let mut thread: Map<String, serde_json::Value> = Map::new();

        let mut cs_array: Vec<serde_json::Value> = Vec::new();

        for el in self.callstack.iter() {
            let mut el_map: Map<String, serde_json::Value> = Map::new();

            if let Some(container) = el.current_pointer.container {
                el_map.insert(
                    "cPath".to_owned(),
                    json!(graph.get_path(container).get_components_string()),
                );
                el_map.insert("idx".to_owned(), json!(el.current_pointer.index));
            }

            el_map.insert("exp".to_owned(), json!(el.in_expression_evaluation));
            el_map.insert("type".to_owned(), json!(el.push_pop_type.to_value()));

            if !el.temporary_variables.is_empty() {
                el_map.insert(
                    "temp".to_owned(),
                    json_write::write_dictionary_values(&el.temporary_variables)?,
                );
            }

            cs_array.push(serde_json::Value::Object(el_map));
        }

        thread.insert("callstack".to_owned(), serde_json::Value::Array(cs_array));
        thread.insert("threadIndex".to_owned(), json!(self.thread_index));

        if let Some(prev) = self.previous_pointer.resolve(graph) {
            thread.insert(
                "previousContentObject".to_owned(),
                json!(graph.get_path(prev).to_string()),
            );
        }

        Ok(serde_json::Value::Object(thread))
    }
}

/// Stack of threads, the last one being the current thread. There is always
/// at least one thread holding at least the root frame.
#[derive(Debug, Clone)]
pub struct CallStack {
    thread_counter: usize,
    start_of_root: Pointer,
    threads: Vec<Thread>,
}

impl CallStack {
    pub fn new(start_of_root: Pointer) -> CallStack {
        let mut cs = CallStack {
            thread_counter: 0,
            start_of_root,
            threads: Vec::new(),
        };

        cs.reset();

        cs
    }

    pub fn reset(&mut self) {
        self.threads.clear();
        self.threads.push(Thread::new());
        self.threads[0]
            .callstack
            .push(Element::new(PushPopType::Plain, self.start_of_root, false));
    }

    pub fn get_current_element(&self) -> &Element {
        self.get_callstack()
            .last()
            .expect("call stack must always hold its root element")
    }

    pub fn get_current_element_mut(&mut self) -> &mut Element {
        self.get_callstack_mut()
            .last_mut()
            .expect("call stack must always hold its root element")
    }

    pub fn get_current_element_index(&self) -> i32 {
        self.get_callstack().len() as i32 - 1
    }

    pub fn get_current_thread(&self) -> &Thread {
        self.threads
            .last()
            .expect("call stack must always hold a thread")
    }

    pub fn get_current_thread_mut(&mut self) -> &mut Thread {
        self.threads
            .last_mut()
            .expect("call stack must always hold a thread")
    }

    /// Replaces the whole stack of threads with `value`, used when a choice
    /// resumes the thread it was generated on.
    pub fn set_current_thread(&mut self, value: Thread) {
        debug_assert!(
            self.threads.len() == 1,
            "Shouldn't be directly setting the current thread when we have a stack of them"
        );
        self.threads.clear();
        self.threads.push(value);
    }

    pub fn get_callstack(&self) -> &Vec<Element> {
        &self.get_current_thread().callstack
    }

    pub fn get_callstack_mut(&mut self) -> &mut Vec<Element> {
        &mut self.get_current_thread_mut().callstack
    }

    pub fn get_threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn depth(&self) -> usize {
        self.get_callstack().len()
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_host()
    }

    pub fn pop_thread(&mut self) {
        assert!(self.can_pop_thread(), "Can't pop thread");
        self.threads.pop();
    }

    pub fn push_thread(&mut self) {
        let new_thread = self.fork_thread();
        self.threads.push(new_thread);
    }

    /// Deep copy of the current thread under a fresh thread index.
    pub fn fork_thread(&mut self) -> Thread {
        let mut forked_thread = self.get_current_thread().clone();
        self.thread_counter += 1;
        forked_thread.thread_index = self.thread_counter;
        forked_thread
    }

    pub fn can_pop(&self) -> bool {
        self.get_callstack().len() > 1
    }

    pub fn can_pop_type(&self, t: Option<PushPopType>) -> bool {
        if !self.can_pop() {
            return false;
        }

        match t {
            None => true,
            Some(t) => self.get_current_element().push_pop_type == t,
        }
    }

    pub fn pop(&mut self, t: Option<PushPopType>) {
        assert!(self.can_pop_type(t), "Mismatched push/pop in Callstack");
        self.get_callstack_mut().pop();
    }

    /// Pushes a frame that starts where the current one is, outside of any
    /// expression evaluation.
    pub fn push(
        &mut self,
        t: PushPopType,
        external_evaluation_stack_height: usize,
        output_stream_length_with_pushed: i32,
    ) {
        let mut element = Element::new(t, self.get_current_element().current_pointer, false);

        element.evaluation_stack_height_when_pushed = external_evaluation_stack_height;
        element.function_start_in_output_stream = output_stream_length_with_pushed;

        self.get_callstack_mut().push(element);
    }

    pub fn element_is_evaluate_from_host(&self) -> bool {
        self.get_current_element().push_pop_type == PushPopType::FunctionEvaluationFromHost
    }

    /// Sets a temporary in the frame `context_index` (1 based, -1 for the
    /// current frame).
    pub fn set_temporary_variable(
        &mut self,
        name: String,
        mut value: ValueType,
        declare_new: bool,
        mut context_index: i32,
    ) -> Result<(), StoryError> {
        if context_index == -1 {
            context_index = self.get_current_element_index() + 1;
        }

        let context_element = self
            .get_callstack_mut()
            .get_mut((context_index - 1) as usize)
            .ok_or_else(|| {
                StoryError::InvalidStoryState(format!(
                    "Temporary variable context {context_index} doesn't exist"
                ))
            })?;

        match context_element.temporary_variables.get(&name) {
            Some(old_value) => ValueType::retain_list_origins_for_assignment(old_value, &mut value),
            None if !declare_new => {
                return Err(StoryError::InvalidStoryState(format!(
                    "Could not find temporary variable to set: {name}"
                )))
            }
            None => {}
        }

        context_element.temporary_variables.insert(name, value);

        Ok(())
    }

    /// 0 for a global, or the 1 based index of the frame holding the temporary.
    pub fn context_for_variable_named(&self, name: &str) -> usize {
        if self.get_current_element().temporary_variables.contains_key(name) {
            return (self.get_current_element_index() + 1) as usize;
        }

        0
    }

    pub fn get_temporary_variable_with_name(&self, name: &str, context_index: i32) -> Option<&ValueType> {
        let context_index = if context_index == -1 {
            self.get_current_element_index() + 1
        } else {
            context_index
        };

        self.get_callstack()
            .get((context_index - 1) as usize)?
            .temporary_variables
            .get(name)
    }

    pub fn get_thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_index == index)
    }

    pub(crate) fn write_json(&self, graph: &ContentGraph) -> Result<serde_json::Value, StoryError> {
        let mut cs: Map<String, serde_json::Value> = Map::new();

        let threads_array = self
            .threads
            .iter()
            .map(|thread| thread.write_json(graph))
            .collect::<Result<Vec<_>, _>>()?;

        cs.insert("threads".to_owned(), serde_json::Value::Array(threads_array));
        cs.insert("threadCounter".to_owned(), json!(self.thread_counter));

        Ok(serde_json::Value::Object(cs))
    }

    pub(crate) fn load_json(
        &mut self,
        graph: &ContentGraph,
        j_obj: &Map<String, serde_json::Value>,
    ) -> Result<(), StoryError> {
        let j_threads = j_obj
            .get("threads")
            .and_then(|t| t.as_array())
            .ok_or(StoryError::BadJson("Callstack without threads".to_owned()))?;

        let mut threads = Vec::with_capacity(j_threads.len());
        for j_thread_tok in j_threads.iter() {
            let j_thread_obj = j_thread_tok
                .as_object()
                .ok_or(StoryError::BadJson("Invalid thread".to_owned()))?;
            threads.push(Thread::from_json(graph, j_thread_obj)?);
        }

        if threads.is_empty() || threads.iter().any(|t| t.callstack.is_empty()) {
            return Err(StoryError::BadJson(
                "Saved callstack needs at least one thread with one element".to_owned(),
            ));
        }

        self.threads = threads;
        self.thread_counter = j_obj
            .get("threadCounter")
            .and_then(|c| c.as_u64())
            .ok_or(StoryError::BadJson("Invalid thread counter".to_owned()))?
            as usize;
        self.start_of_root = Pointer::start_of(graph.root());

        Ok(())
    }

    pub fn get_callstack_trace(&self, graph: &ContentGraph) -> String {
        let mut sb = String::new();

        for (t, thread) in self.threads.iter().enumerate() {
            let is_current = t == self.threads.len() - 1;

            sb.push_str(&format!(
                "=== THREAD {}/{} {}===\n",
                t + 1,
                self.threads.len(),
                if is_current { "(current) " } else { "" }
            ));

            for element in &thread.callstack {
                sb.push_str(match element.push_pop_type {
                    PushPopType::Tunnel => "  [TUNNEL] ",
                    PushPopType::Function | PushPopType::FunctionEvaluationFromHost => "  [FUNCTION] ",
                    PushPopType::Plain => "  ",
                });

                if let Some(path) = element.current_pointer.get_path(graph) {
                    sb.push_str(&format!("<SOMEWHERE IN {path}>\n"));
                }
            }
        }

        sb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::Container, object::RTObject};

    fn graph() -> ContentGraph {
        let mut g = ContentGraph::new();
        let root = g.add(RTObject::Container(Container::new(None, 0)));
        g.set_root(root);
        let text = g.add(RTObject::new_string("hi"));
        g.add_content(root, text).unwrap();
        g
    }

    #[test]
    fn root_frame_is_never_popped() {
        let g = graph();
        let cs = CallStack::new(Pointer::start_of(g.root()));
        assert!(!cs.can_pop());
        assert_eq!(cs.get_current_element().push_pop_type, PushPopType::Plain);
    }

    #[test]
    #[should_panic(expected = "Mismatched push/pop")]
    fn popping_the_root_frame_panics() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.pop(None);
    }

    #[test]
    #[should_panic(expected = "Mismatched push/pop")]
    fn mismatched_pop_panics() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.push(PushPopType::Tunnel, 0, 0);
        cs.pop(Some(PushPopType::Function));
    }

    #[test]
    fn trace_labels_frames_by_kind() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.push(PushPopType::Tunnel, 0, 0);
        cs.push(PushPopType::Function, 0, 0);

        let trace = cs.get_callstack_trace(&g);
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!("=== THREAD 1/1 (current) ===", lines[0]);
        assert!(!lines[1].contains('['));
        assert!(lines[2].starts_with("  [TUNNEL] "));
        assert!(lines[3].starts_with("  [FUNCTION] "));
        assert_eq!(1, trace.matches("[TUNNEL]").count());
    }

    #[test]
    fn forked_threads_copy_temporaries() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.set_temporary_variable("x".to_owned(), ValueType::new(1), true, -1)
            .unwrap();

        cs.push_thread();
        assert_eq!(cs.get_current_thread().thread_index, 1);
        cs.set_temporary_variable("x".to_owned(), ValueType::new(2), false, -1)
            .unwrap();

        cs.pop_thread();
        assert_eq!(
            cs.get_temporary_variable_with_name("x", -1),
            Some(&ValueType::new(1))
        );
        assert_eq!(cs.fork_thread().thread_index, 2);
    }

    #[test]
    fn host_evaluation_frame_blocks_thread_pop() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.push_thread();
        assert!(cs.can_pop_thread());

        cs.push(PushPopType::FunctionEvaluationFromHost, 0, 0);
        assert!(!cs.can_pop_thread());
    }

    #[test]
    fn setting_undeclared_temporary_fails() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        assert!(cs
            .set_temporary_variable("nope".to_owned(), ValueType::new(1), false, -1)
            .is_err());
    }

    #[test]
    fn json_round_trip() {
        let g = graph();
        let mut cs = CallStack::new(Pointer::start_of(g.root()));
        cs.push(PushPopType::Function, 0, 0);
        cs.set_temporary_variable("t".to_owned(), ValueType::new("s"), true, -1)
            .unwrap();
        cs.push_thread();

        let j = cs.write_json(&g).unwrap();
        let mut loaded = CallStack::new(Pointer::start_of(g.root()));
        loaded.load_json(&g, j.as_object().unwrap()).unwrap();

        assert_eq!(loaded.get_threads().len(), 2);
        assert_eq!(loaded.depth(), 2);
        assert_eq!(
            loaded.get_current_element().push_pop_type,
            PushPopType::Function
        );
        assert_eq!(
            loaded.get_temporary_variable_with_name("t", -1),
            Some(&ValueType::new("s"))
        );
        assert_eq!(loaded.write_json(&g).unwrap(), j);
    }
}
